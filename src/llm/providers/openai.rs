use super::{
    extract_text, openai_usage, post_for_json, require_api_key, LlmProvider, DEFAULT_TEMPERATURE,
};
use crate::llm::transport::{HttpRequest, HttpTransport};
use crate::llm::{ChatMessage, ChatResult, LlmError, ProviderDescriptor};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// Provider implementation for OpenAI's chat completions API
#[derive(Debug)]
pub struct OpenAiProvider {
    api_key: Option<String>,
    base_url: String,
    transport: Arc<dyn HttpTransport>,
}

impl OpenAiProvider {
    pub fn new(descriptor: &ProviderDescriptor, transport: Arc<dyn HttpTransport>) -> Self {
        OpenAiProvider {
            api_key: descriptor.api_key.clone(),
            base_url: descriptor.base_url.clone(),
            transport,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn id(&self) -> &str {
        "openai"
    }

    async fn send(&self, model: &str, messages: &[ChatMessage]) -> Result<ChatResult, LlmError> {
        let api_key = require_api_key(&self.api_key, "OpenAI")?;

        let request_body = json!({
            "model": model,
            "messages": messages,
            "temperature": DEFAULT_TEMPERATURE
        });

        let request =
            HttpRequest::post(&format!("{}/chat/completions", self.base_url), request_body)?
                .bearer_auth(api_key);

        let json_resp = post_for_json(self.transport.as_ref(), request, "OpenAI").await?;
        Ok(ChatResult {
            content: extract_text(&json_resp, "/choices/0/message/content", "OpenAI")?,
            model: model.to_string(),
            provider: self.id().to_string(),
            usage: openai_usage(&json_resp),
        })
    }
}
