use crate::llm::providers::{build_adapter, AdapterOptions, LlmProvider};
use crate::llm::transport::HttpTransport;
use crate::llm::{ChatMessage, ChatResult, LlmError, ProviderRegistry};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// One row of the provider introspection listing
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProviderSummary {
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub models: Vec<String>,
    pub configured: bool,
}

/// Routes normalized chat requests to the adapter registered for a provider.
#[derive(Debug)]
pub struct ChatDispatcher {
    registry: Arc<ProviderRegistry>,
    adapters: HashMap<String, Arc<dyn LlmProvider>>,
}

impl ChatDispatcher {
    /// Creates a dispatcher with one adapter per registry entry.
    ///
    /// # Arguments
    /// * `registry` - Provider catalog built at startup
    /// * `transport` - HTTP transport shared by every adapter
    /// * `options` - Per-adapter translation options
    pub fn new(
        registry: Arc<ProviderRegistry>,
        transport: Arc<dyn HttpTransport>,
        options: AdapterOptions,
    ) -> Self {
        let adapters = registry
            .descriptors()
            .iter()
            .map(|descriptor| {
                (
                    descriptor.id.clone(),
                    build_adapter(descriptor, transport.clone(), options),
                )
            })
            .collect::<HashMap<_, _>>();

        debug!("Registered chat adapters: {:?}", adapters.keys());
        ChatDispatcher { registry, adapters }
    }

    /// Sends a conversation to the named provider and returns its answer unchanged.
    ///
    /// # Arguments
    /// * `provider_id` - Registry identifier, e.g. "openai"
    /// * `model` - Model name, passed through without validation
    /// * `messages` - Non-empty conversation with at most one system message
    pub async fn chat(
        &self,
        provider_id: &str,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<ChatResult, LlmError> {
        let adapter = self
            .adapters
            .get(provider_id)
            .ok_or_else(|| LlmError::UnknownProvider(provider_id.to_string()))?;

        if messages.is_empty() {
            return Err(LlmError::InvalidRequest(
                "conversation must contain at least one message".to_string(),
            ));
        }
        if messages.iter().filter(|m| m.is_system()).count() > 1 {
            return Err(LlmError::InvalidRequest(
                "conversation may contain at most one system message".to_string(),
            ));
        }

        info!(
            "Chat request to {} ({}) with {} messages",
            provider_id,
            model,
            messages.len()
        );
        let result = adapter.send(model, messages).await?;
        debug!("{} answered with {} chars", provider_id, result.content.len());
        Ok(result)
    }

    pub fn list_providers(&self) -> Vec<String> {
        self.registry.list_providers()
    }

    pub fn models_for(&self, provider_id: &str) -> Vec<String> {
        self.registry.models_for(provider_id)
    }

    pub fn is_configured(&self, provider_id: &str) -> bool {
        self.registry.is_configured(provider_id)
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn provider_summaries(&self) -> Vec<ProviderSummary> {
        self.list_providers()
            .into_iter()
            .map(|name| ProviderSummary {
                display_name: self
                    .registry
                    .get(&name)
                    .map(|p| p.display_name.clone())
                    .unwrap_or_else(|| name.clone()),
                models: self.models_for(&name),
                configured: self.is_configured(&name),
                name,
            })
            .collect()
    }
}
