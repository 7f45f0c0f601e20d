use crate::llm::transport::{HttpRequest, HttpTransport};
use crate::llm::{ChatMessage, ChatResult, LlmError, ProviderDescriptor, ProviderKind};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, warn};

pub mod anthropic;
pub mod google;
pub mod ollama;
pub mod openai;
pub mod perplexity;

pub use google::GoogleSystemMode;

/// Temperature sent to providers that accept one
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
/// Completion budget for providers that require or accept a cap
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

#[async_trait]
pub trait LlmProvider: Debug + Send + Sync {
    fn id(&self) -> &str;
    async fn send(&self, model: &str, messages: &[ChatMessage]) -> Result<ChatResult, LlmError>;
}

/// Options that change how a particular adapter translates requests
#[derive(Debug, Clone, Copy, Default)]
pub struct AdapterOptions {
    pub google_system_mode: GoogleSystemMode,
}

/// Builds the adapter matching the descriptor's provider kind.
pub fn build_adapter(
    descriptor: &ProviderDescriptor,
    transport: Arc<dyn HttpTransport>,
    options: AdapterOptions,
) -> Arc<dyn LlmProvider> {
    match descriptor.kind {
        ProviderKind::OpenAi => Arc::new(openai::OpenAiProvider::new(descriptor, transport)),
        ProviderKind::Anthropic => {
            Arc::new(anthropic::AnthropicProvider::new(descriptor, transport))
        }
        ProviderKind::Google => Arc::new(google::GoogleProvider::new(
            descriptor,
            transport,
            options.google_system_mode,
        )),
        ProviderKind::Perplexity => {
            Arc::new(perplexity::PerplexityProvider::new(descriptor, transport))
        }
        ProviderKind::Ollama => Arc::new(ollama::OllamaProvider::new(descriptor, transport)),
    }
}

/// Returns the credential or fails before any network I/O happens.
fn require_api_key<'a>(api_key: &'a Option<String>, provider: &str) -> Result<&'a str, LlmError> {
    api_key
        .as_deref()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| LlmError::Configuration {
            provider: provider.to_string(),
        })
}

/// Sends the request and parses a success body as JSON.
async fn post_for_json(
    transport: &dyn HttpTransport,
    request: HttpRequest,
    provider: &str,
) -> Result<Value, LlmError> {
    debug!("{} request to {}", provider, request.url.path());
    let res = transport.post_json(request).await?;

    if !res.is_success() {
        warn!("{} API error {}: {}", provider, res.status, res.body);
        return Err(LlmError::Remote {
            provider: provider.to_string(),
            status: res.status,
            reason: res.reason,
        });
    }

    serde_json::from_str(&res.body)
        .map_err(|e| LlmError::shape(provider, format!("body is not JSON: {}", e)))
}

/// Reads the string at a JSON pointer such as `/choices/0/message/content`.
fn extract_text(body: &Value, pointer: &str, provider: &str) -> Result<String, LlmError> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| LlmError::shape(provider, format!("missing {}", pointer)))
}

fn read_count(body: &Value, pointer: &str) -> Option<u64> {
    body.pointer(pointer).and_then(Value::as_u64)
}

/// Usage block shared by the OpenAI-compatible APIs
fn openai_usage(body: &Value) -> Option<crate::llm::Usage> {
    crate::llm::Usage::from_counts(
        read_count(body, "/usage/prompt_tokens"),
        read_count(body, "/usage/completion_tokens"),
        read_count(body, "/usage/total_tokens"),
    )
}
