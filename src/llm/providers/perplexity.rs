use super::{
    extract_text, openai_usage, post_for_json, require_api_key, LlmProvider, DEFAULT_MAX_TOKENS,
    DEFAULT_TEMPERATURE,
};
use crate::llm::transport::{HttpRequest, HttpTransport};
use crate::llm::{ChatMessage, ChatResult, LlmError, ProviderDescriptor};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// Provider implementation for Perplexity's OpenAI-compatible API
#[derive(Debug)]
pub struct PerplexityProvider {
    api_key: Option<String>,
    base_url: String,
    transport: Arc<dyn HttpTransport>,
}

impl PerplexityProvider {
    pub fn new(descriptor: &ProviderDescriptor, transport: Arc<dyn HttpTransport>) -> Self {
        PerplexityProvider {
            api_key: descriptor.api_key.clone(),
            base_url: descriptor.base_url.clone(),
            transport,
        }
    }
}

#[async_trait]
impl LlmProvider for PerplexityProvider {
    fn id(&self) -> &str {
        "perplexity"
    }

    async fn send(&self, model: &str, messages: &[ChatMessage]) -> Result<ChatResult, LlmError> {
        let api_key = require_api_key(&self.api_key, "Perplexity")?;

        let request_body = json!({
            "model": model,
            "messages": messages,
            "temperature": DEFAULT_TEMPERATURE,
            "max_tokens": DEFAULT_MAX_TOKENS
        });

        let request =
            HttpRequest::post(&format!("{}/chat/completions", self.base_url), request_body)?
                .bearer_auth(api_key);

        let json_resp = post_for_json(self.transport.as_ref(), request, "Perplexity").await?;
        Ok(ChatResult {
            content: extract_text(&json_resp, "/choices/0/message/content", "Perplexity")?,
            model: model.to_string(),
            provider: self.id().to_string(),
            usage: openai_usage(&json_resp),
        })
    }
}
