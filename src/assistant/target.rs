use crate::config::AssistantConfig;
use crate::llm::ProviderRegistry;
use serde::Serialize;

/// Provider and model a single assistant call is sent to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTarget {
    pub provider: String,
    pub model: String,
}

impl ChatTarget {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        ChatTarget {
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Fills in whatever the caller left out
    ///
    /// A missing provider becomes the configured default. A missing model becomes
    /// the provider's first registered model, or the configured default model when
    /// the provider is unknown or lists none.
    pub fn resolve(
        provider: Option<&str>,
        model: Option<&str>,
        defaults: &AssistantConfig,
        registry: &ProviderRegistry,
    ) -> Self {
        let provider = provider
            .filter(|p| !p.is_empty())
            .unwrap_or(defaults.default_provider.as_str());
        let model = model
            .filter(|m| !m.is_empty())
            .or_else(|| registry.default_model(provider))
            .unwrap_or(defaults.default_model.as_str());
        ChatTarget::new(provider, model)
    }
}
