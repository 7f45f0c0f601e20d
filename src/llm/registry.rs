//! Static catalog of the chat providers known to the server.

use crate::config::{ProviderSettings, ProvidersConfig};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// Closed set of supported providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Google,
    Perplexity,
    Ollama,
}

impl ProviderKind {
    /// Registration order, which is also the listing order
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Google,
        ProviderKind::Perplexity,
        ProviderKind::Ollama,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Google => "google",
            ProviderKind::Perplexity => "perplexity",
            ProviderKind::Ollama => "ollama",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::Google => "Google",
            ProviderKind::Perplexity => "Perplexity",
            ProviderKind::Ollama => "Ollama",
        }
    }

    /// Self-hosted providers run without a credential
    pub fn requires_credential(&self) -> bool {
        !matches!(self, ProviderKind::Ollama)
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1",
            ProviderKind::Google => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::Perplexity => "https://api.perplexity.ai",
            ProviderKind::Ollama => "http://localhost:11434",
        }
    }

    pub fn default_models(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::OpenAi => &["gpt-4", "gpt-4-turbo", "gpt-3.5-turbo"],
            ProviderKind::Anthropic => &[
                "claude-3-opus-20240229",
                "claude-3-sonnet-20240229",
                "claude-3-haiku-20240307",
            ],
            ProviderKind::Google => &["gemini-pro", "gemini-pro-vision"],
            ProviderKind::Perplexity => &[
                "llama-3.1-sonar-small-128k-online",
                "llama-3.1-sonar-large-128k-online",
                "llama-3.1-sonar-huge-128k-online",
            ],
            ProviderKind::Ollama => &["llama2", "llama3", "mistral", "codellama"],
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Connection metadata for one provider
#[derive(Clone)]
pub struct ProviderDescriptor {
    pub kind: ProviderKind,
    pub id: String,
    pub display_name: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub models: Vec<String>,
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("id", &self.id)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("models", &self.models)
            .finish()
    }
}

impl ProviderDescriptor {
    pub fn new(kind: ProviderKind, api_key: Option<String>, base_url: Option<String>) -> Self {
        ProviderDescriptor {
            kind,
            id: kind.id().to_string(),
            display_name: kind.display_name().to_string(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| kind.default_base_url().to_string())
                .trim_end_matches('/')
                .to_string(),
            models: kind.default_models().iter().map(|m| m.to_string()).collect(),
        }
    }

    fn from_settings(kind: ProviderKind, settings: &ProviderSettings) -> Self {
        let mut descriptor =
            ProviderDescriptor::new(kind, settings.api_key.clone(), settings.base_url.clone());
        if let Some(models) = settings.models.as_ref().filter(|m| !m.is_empty()) {
            descriptor.models = models.clone();
        }
        descriptor
    }

    /// Non-empty credential, if one was supplied
    pub fn credential(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.is_empty())
    }

    pub fn is_configured(&self) -> bool {
        !self.kind.requires_credential() || self.credential().is_some()
    }
}

/// Read-only provider catalog, built once at process start
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<ProviderDescriptor>,
}

impl ProviderRegistry {
    /// Builds the catalog from the providers section of the configuration.
    pub fn from_config(config: &ProvidersConfig) -> Self {
        let providers = ProviderKind::ALL
            .into_iter()
            .map(|kind| ProviderDescriptor::from_settings(kind, config.settings(kind)))
            .collect::<Vec<_>>();

        for descriptor in &providers {
            if descriptor.is_configured() {
                info!("Provider '{}' configured at {}", descriptor.id, descriptor.base_url);
            } else {
                warn!("Provider '{}' has no API key, calls will be rejected", descriptor.id);
            }
        }

        ProviderRegistry { providers }
    }

    pub fn list_providers(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.id.clone()).collect()
    }

    pub fn models_for(&self, provider_id: &str) -> Vec<String> {
        self.get(provider_id)
            .map(|p| p.models.clone())
            .unwrap_or_default()
    }

    pub fn is_configured(&self, provider_id: &str) -> bool {
        self.get(provider_id).is_some_and(|p| p.is_configured())
    }

    pub fn get(&self, provider_id: &str) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|p| p.id == provider_id)
    }

    pub fn default_model(&self, provider_id: &str) -> Option<&str> {
        self.get(provider_id)
            .and_then(|p| p.models.first())
            .map(String::as_str)
    }

    pub fn descriptors(&self) -> &[ProviderDescriptor] {
        &self.providers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_keys(keys: &[(ProviderKind, &str)]) -> ProviderRegistry {
        let mut config = ProvidersConfig::default();
        for (kind, key) in keys {
            config.settings_mut(*kind).api_key = Some(key.to_string());
        }
        ProviderRegistry::from_config(&config)
    }

    #[test]
    fn test_list_providers_keeps_registration_order() {
        let registry = registry_with_keys(&[]);
        assert_eq!(
            registry.list_providers(),
            vec!["openai", "anthropic", "google", "perplexity", "ollama"]
        );
    }

    #[test]
    fn test_is_configured_follows_credentials() {
        let registry = registry_with_keys(&[]);
        for kind in ProviderKind::ALL {
            assert_eq!(
                registry.is_configured(kind.id()),
                kind == ProviderKind::Ollama,
                "{} without key",
                kind
            );
        }

        let registry = registry_with_keys(&[
            (ProviderKind::OpenAi, "sk-1"),
            (ProviderKind::Anthropic, "sk-2"),
            (ProviderKind::Google, "g-3"),
            (ProviderKind::Perplexity, "pplx-4"),
        ]);
        for kind in ProviderKind::ALL {
            assert!(registry.is_configured(kind.id()), "{} with key", kind);
        }
    }

    #[test]
    fn test_empty_key_is_not_configured() {
        let registry = registry_with_keys(&[(ProviderKind::OpenAi, "")]);
        assert!(!registry.is_configured("openai"));
    }

    #[test]
    fn test_unknown_provider_queries() {
        let registry = registry_with_keys(&[]);
        assert!(registry.models_for("mystery").is_empty());
        assert!(!registry.is_configured("mystery"));
        assert_eq!(registry.default_model("ollama"), Some("llama2"));
    }

    #[test]
    fn test_base_url_override_is_trimmed() {
        let mut config = ProvidersConfig::default();
        config.ollama.base_url = Some("http://gpu-box:11434/".to_string());
        let registry = ProviderRegistry::from_config(&config);
        assert_eq!(registry.get("ollama").unwrap().base_url, "http://gpu-box:11434");
    }
}
