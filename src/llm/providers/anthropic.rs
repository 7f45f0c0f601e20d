use super::{extract_text, post_for_json, read_count, require_api_key, LlmProvider, DEFAULT_MAX_TOKENS};
use crate::llm::transport::{HttpRequest, HttpTransport};
use crate::llm::{ChatMessage, ChatResult, LlmError, ProviderDescriptor, Usage};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Provider implementation for Anthropic's messages API
#[derive(Debug)]
pub struct AnthropicProvider {
    api_key: Option<String>,
    base_url: String,
    transport: Arc<dyn HttpTransport>,
}

impl AnthropicProvider {
    pub fn new(descriptor: &ProviderDescriptor, transport: Arc<dyn HttpTransport>) -> Self {
        AnthropicProvider {
            api_key: descriptor.api_key.clone(),
            base_url: descriptor.base_url.clone(),
            transport,
        }
    }

    /// Lifts the first system message out of the conversation.
    fn split_system(messages: &[ChatMessage]) -> (Option<String>, Vec<&ChatMessage>) {
        let system = messages
            .iter()
            .find(|m| m.is_system())
            .map(|m| m.content.clone());
        let conversation = messages.iter().filter(|m| !m.is_system()).collect();
        (system, conversation)
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn id(&self) -> &str {
        "anthropic"
    }

    async fn send(&self, model: &str, messages: &[ChatMessage]) -> Result<ChatResult, LlmError> {
        let api_key = require_api_key(&self.api_key, "Anthropic")?;
        let (system, conversation) = Self::split_system(messages);

        let mut request_body = json!({
            "model": model,
            "max_tokens": DEFAULT_MAX_TOKENS,
            "messages": conversation
        });
        if let Some(system) = system {
            request_body["system"] = Value::String(system);
        }

        let request = HttpRequest::post(&format!("{}/messages", self.base_url), request_body)?
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);

        let json_resp = post_for_json(self.transport.as_ref(), request, "Anthropic").await?;
        Ok(ChatResult {
            content: extract_text(&json_resp, "/content/0/text", "Anthropic")?,
            model: model.to_string(),
            provider: self.id().to_string(),
            usage: Usage::from_counts(
                read_count(&json_resp, "/usage/input_tokens"),
                read_count(&json_resp, "/usage/output_tokens"),
                None,
            ),
        })
    }
}
