use super::{
    extract_text, post_for_json, read_count, require_api_key, LlmProvider, DEFAULT_MAX_TOKENS,
    DEFAULT_TEMPERATURE,
};
use crate::llm::transport::{HttpRequest, HttpTransport};
use crate::llm::{ChatMessage, ChatResult, LlmError, ProviderDescriptor, Role, Usage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// How a system message is presented to the Gemini API, which has no system role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoogleSystemMode {
    /// The system text becomes an ordinary user turn at its original position
    #[default]
    UserTurn,
    /// The system text goes into the top-level `systemInstruction` field
    SystemInstruction,
    /// The system text is discarded
    Drop,
}

impl FromStr for GoogleSystemMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user_turn" => Ok(GoogleSystemMode::UserTurn),
            "system_instruction" => Ok(GoogleSystemMode::SystemInstruction),
            "drop" => Ok(GoogleSystemMode::Drop),
            other => Err(format!("unknown google system mode '{}'", other)),
        }
    }
}

impl fmt::Display for GoogleSystemMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GoogleSystemMode::UserTurn => "user_turn",
            GoogleSystemMode::SystemInstruction => "system_instruction",
            GoogleSystemMode::Drop => "drop",
        })
    }
}

/// Provider implementation for Google's Gemini `generateContent` API
#[derive(Debug)]
pub struct GoogleProvider {
    api_key: Option<String>,
    base_url: String,
    system_mode: GoogleSystemMode,
    transport: Arc<dyn HttpTransport>,
}

impl GoogleProvider {
    pub fn new(
        descriptor: &ProviderDescriptor,
        transport: Arc<dyn HttpTransport>,
        system_mode: GoogleSystemMode,
    ) -> Self {
        GoogleProvider {
            api_key: descriptor.api_key.clone(),
            base_url: descriptor.base_url.clone(),
            system_mode,
            transport,
        }
    }

    fn turn(role: &str, text: &str) -> Value {
        json!({"role": role, "parts": [{"text": text}]})
    }

    /// Converts the conversation to `contents`, plus an optional `systemInstruction`.
    fn convert_messages(&self, messages: &[ChatMessage]) -> (Vec<Value>, Option<Value>) {
        let mut contents = Vec::with_capacity(messages.len());
        let mut instruction = None;

        for msg in messages {
            match (msg.role, self.system_mode) {
                (Role::System, GoogleSystemMode::UserTurn) => {
                    contents.push(Self::turn("user", &msg.content))
                }
                (Role::System, GoogleSystemMode::SystemInstruction) => {
                    if instruction.is_none() {
                        instruction = Some(json!({"parts": [{"text": msg.content}]}));
                    }
                }
                (Role::System, GoogleSystemMode::Drop) => {}
                (Role::User, _) => contents.push(Self::turn("user", &msg.content)),
                (Role::Assistant, _) => contents.push(Self::turn("model", &msg.content)),
            }
        }

        (contents, instruction)
    }
}

#[async_trait]
impl LlmProvider for GoogleProvider {
    fn id(&self) -> &str {
        "google"
    }

    async fn send(&self, model: &str, messages: &[ChatMessage]) -> Result<ChatResult, LlmError> {
        let api_key = require_api_key(&self.api_key, "Google")?;
        let (contents, instruction) = self.convert_messages(messages);

        let mut request_body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": DEFAULT_TEMPERATURE,
                "maxOutputTokens": DEFAULT_MAX_TOKENS
            }
        });
        if let Some(instruction) = instruction {
            request_body["systemInstruction"] = instruction;
        }

        let endpoint = format!("{}/models/{}:generateContent", self.base_url, model);
        let request = HttpRequest::post(&endpoint, request_body)?.query("key", api_key);

        let json_resp = post_for_json(self.transport.as_ref(), request, "Google").await?;
        Ok(ChatResult {
            content: extract_text(&json_resp, "/candidates/0/content/parts/0/text", "Google")?,
            model: model.to_string(),
            provider: self.id().to_string(),
            usage: Usage::from_counts(
                read_count(&json_resp, "/usageMetadata/promptTokenCount"),
                read_count(&json_resp, "/usageMetadata/candidatesTokenCount"),
                read_count(&json_resp, "/usageMetadata/totalTokenCount"),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::transport::testing::FakeTransport;
    use crate::llm::ProviderKind;

    fn answer() -> Value {
        json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "ok"}]}}],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 1, "totalTokenCount": 5}
        })
    }

    fn provider(
        key: Option<&str>,
        mode: GoogleSystemMode,
        transport: Arc<FakeTransport>,
    ) -> GoogleProvider {
        let descriptor =
            ProviderDescriptor::new(ProviderKind::Google, key.map(str::to_string), None);
        GoogleProvider::new(&descriptor, transport, mode)
    }

    fn conversation() -> Vec<ChatMessage> {
        vec![ChatMessage::system("s"), ChatMessage::user("u")]
    }

    #[tokio::test]
    async fn test_default_mode_sends_system_as_user_turn() {
        let transport = Arc::new(FakeTransport::ok(answer()));
        let result = provider(Some("g-key"), GoogleSystemMode::default(), transport.clone())
            .send("gemini-pro", &conversation())
            .await
            .unwrap();

        let request = transport.last_request();
        assert_eq!(request.url.path(), "/v1beta/models/gemini-pro:generateContent");
        let key = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "key")
            .map(|(_, v)| v.into_owned());
        assert_eq!(key.as_deref(), Some("g-key"));
        assert!(request.header_value("authorization").is_none());
        assert_eq!(
            request.body,
            json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "s"}]},
                    {"role": "user", "parts": [{"text": "u"}]}
                ],
                "generationConfig": {"temperature": 0.7, "maxOutputTokens": 4000}
            })
        );
        assert_eq!(result.content, "ok");
        assert_eq!(result.usage.unwrap().total_tokens, Some(5));
    }

    #[tokio::test]
    async fn test_system_instruction_mode() {
        let transport = Arc::new(FakeTransport::ok(answer()));
        provider(Some("g-key"), GoogleSystemMode::SystemInstruction, transport.clone())
            .send("gemini-pro", &conversation())
            .await
            .unwrap();

        let body = transport.last_request().body;
        assert_eq!(body["systemInstruction"], json!({"parts": [{"text": "s"}]}));
        assert_eq!(
            body["contents"],
            json!([{"role": "user", "parts": [{"text": "u"}]}])
        );
    }

    #[tokio::test]
    async fn test_drop_mode_and_assistant_remap() {
        let transport = Arc::new(FakeTransport::ok(answer()));
        let messages = vec![
            ChatMessage::system("s"),
            ChatMessage::user("u"),
            ChatMessage::new(Role::Assistant, "a"),
        ];
        provider(Some("g-key"), GoogleSystemMode::Drop, transport.clone())
            .send("gemini-pro", &messages)
            .await
            .unwrap();

        let body = transport.last_request().body;
        assert!(body.get("systemInstruction").is_none());
        assert_eq!(
            body["contents"],
            json!([
                {"role": "user", "parts": [{"text": "u"}]},
                {"role": "model", "parts": [{"text": "a"}]}
            ])
        );
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_io() {
        let transport = Arc::new(FakeTransport::ok(answer()));
        let err = provider(None, GoogleSystemMode::default(), transport.clone())
            .send("gemini-pro", &conversation())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Configuration { .. }));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_non_success_is_remote_error() {
        let transport = Arc::new(FakeTransport::replying(400, json!({"error": {}})));
        let err = provider(Some("g-key"), GoogleSystemMode::default(), transport)
            .send("gemini-pro", &conversation())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Remote { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_missing_field_is_shape_error() {
        let transport = Arc::new(FakeTransport::ok(json!({"candidates": [{"finishReason": "SAFETY"}]})));
        let err = provider(Some("g-key"), GoogleSystemMode::default(), transport)
            .send("gemini-pro", &conversation())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Shape { .. }));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("drop".parse::<GoogleSystemMode>(), Ok(GoogleSystemMode::Drop));
        assert_eq!(
            "System_Instruction".parse::<GoogleSystemMode>(),
            Ok(GoogleSystemMode::SystemInstruction)
        );
        assert!("merge".parse::<GoogleSystemMode>().is_err());
    }
}
