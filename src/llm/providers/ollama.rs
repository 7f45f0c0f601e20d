use super::{extract_text, post_for_json, read_count, LlmProvider};
use crate::llm::transport::{HttpRequest, HttpTransport};
use crate::llm::{ChatMessage, ChatResult, LlmError, ProviderDescriptor, Usage};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// Provider implementation for a local Ollama server
#[derive(Debug)]
pub struct OllamaProvider {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
}

impl OllamaProvider {
    pub fn new(descriptor: &ProviderDescriptor, transport: Arc<dyn HttpTransport>) -> Self {
        OllamaProvider {
            base_url: descriptor.base_url.clone(),
            transport,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn id(&self) -> &str {
        "ollama"
    }

    async fn send(&self, model: &str, messages: &[ChatMessage]) -> Result<ChatResult, LlmError> {
        let request_body = json!({
            "model": model,
            "messages": messages,
            "stream": false
        });

        let request = HttpRequest::post(&format!("{}/api/chat", self.base_url), request_body)?;

        let json_resp = post_for_json(self.transport.as_ref(), request, "Ollama").await?;
        Ok(ChatResult {
            content: extract_text(&json_resp, "/message/content", "Ollama")?,
            model: model.to_string(),
            provider: self.id().to_string(),
            usage: Usage::from_counts(
                read_count(&json_resp, "/prompt_eval_count"),
                read_count(&json_resp, "/eval_count"),
                None,
            ),
        })
    }
}
