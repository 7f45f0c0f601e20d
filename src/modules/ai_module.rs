//! Language-model tools backed by the domain assistant.

use crate::assistant::{AiAssistant, AnalysisKind, ChatTarget};
use crate::errors::ToolError;
use crate::llm::ProviderKind;
use crate::modules::{parse_args, Module, ModuleAction, ToolResponse};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetArgs {
    provider: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductArgs {
    product_id: Option<String>,
    #[serde(flatten)]
    target: TargetArgs,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationArgs {
    user_id: Option<String>,
    #[serde(flatten)]
    target: TargetArgs,
}

#[derive(Debug, Deserialize)]
struct ChatArgs {
    query: String,
    context: Option<Value>,
    #[serde(flatten)]
    target: TargetArgs,
}

#[derive(Debug, Deserialize)]
struct DataArgs {
    #[serde(rename = "type")]
    kind: AnalysisKind,
    data: Value,
    #[serde(flatten)]
    target: TargetArgs,
}

/// Schema properties shared by every tool that talks to a model
fn target_properties() -> Map<String, Value> {
    let providers: Vec<&str> = ProviderKind::ALL.iter().map(|kind| kind.id()).collect();
    let mut properties = Map::new();
    properties.insert(
        "provider".to_string(),
        json!({
            "type": "string",
            "enum": providers,
            "default": "ollama",
            "description": "AI provider to use",
        }),
    );
    properties.insert(
        "model".to_string(),
        json!({"type": "string", "description": "Model to use (provider default when omitted)"}),
    );
    properties
}

fn object_schema(extra: Value, required: &[&str]) -> Value {
    let mut properties = target_properties();
    if let Value::Object(extra) = extra {
        properties.extend(extra);
    }
    json!({"type": "object", "properties": properties, "required": required})
}

/// Answer payload: `field` holds the model's text, followed by the target that produced it
fn answer(field: &str, text: String, target: &ChatTarget) -> Result<ToolResponse, ToolError> {
    let mut body = Map::new();
    body.insert(field.to_string(), Value::String(text));
    body.insert("provider".to_string(), json!(target.provider));
    body.insert("model".to_string(), json!(target.model));
    body.insert("timestamp".to_string(), json!(Utc::now().to_rfc3339()));
    ToolResponse::json(&body)
}

#[derive(Debug)]
pub struct AiModule {
    assistant: Arc<AiAssistant>,
}

impl AiModule {
    pub fn new(assistant: Arc<AiAssistant>) -> Self {
        AiModule { assistant }
    }

    fn target(&self, args: &TargetArgs) -> ChatTarget {
        self.assistant
            .target(args.provider.as_deref(), args.model.as_deref())
    }
}

#[async_trait]
impl Module for AiModule {
    fn name(&self) -> &str {
        "ai"
    }

    fn get_actions(&self) -> Vec<ModuleAction> {
        vec![
            ModuleAction::new(
                "ai_analyze_products",
                "Analyze product performance with an AI model",
                object_schema(
                    json!({"productId": {"type": "string", "description": "Product ID to analyze (top products when omitted)"}}),
                    &[],
                ),
            ),
            ModuleAction::new(
                "ai_generate_recommendations",
                "Generate AI-powered product recommendations",
                object_schema(
                    json!({"userId": {"type": "string", "description": "User ID for personalized recommendations"}}),
                    &[],
                ),
            ),
            ModuleAction::new(
                "ai_analyze_cart_abandonment",
                "Analyze cart abandonment patterns with AI",
                object_schema(json!({}), &[]),
            ),
            ModuleAction::new(
                "ai_business_insights",
                "Generate AI-powered business insights",
                object_schema(json!({}), &[]),
            ),
            ModuleAction::new(
                "ai_chat",
                "Chat with an AI model about store data",
                object_schema(
                    json!({
                        "query": {"type": "string", "minLength": 1, "description": "Question or request"},
                        "context": {"type": "object", "description": "Additional context data"},
                    }),
                    &["query"],
                ),
            ),
            ModuleAction::new(
                "ai_analyze_data",
                "Analyze caller-supplied data with an AI model",
                object_schema(
                    json!({
                        "type": {
                            "type": "string",
                            "enum": ["product", "cart", "business", "recommendations"],
                            "description": "Kind of analysis to run",
                        },
                        "data": {"description": "Data to analyze"},
                    }),
                    &["type", "data"],
                ),
            ),
            ModuleAction::new(
                "ai_providers",
                "List available AI providers and their models",
                json!({"type": "object", "properties": {}}),
            ),
        ]
    }

    async fn handle_action(&self, action: &str, args: &Value) -> Result<ToolResponse, ToolError> {
        match action {
            "ai_analyze_products" => {
                let args: ProductArgs = parse_args(action, args)?;
                let target = self.target(&args.target);
                let analysis = self
                    .assistant
                    .analyze_product_performance(args.product_id.as_deref(), &target)
                    .await?;
                answer("analysis", analysis, &target)
            }
            "ai_generate_recommendations" => {
                let args: RecommendationArgs = parse_args(action, args)?;
                let target = self.target(&args.target);
                let recommendations = self
                    .assistant
                    .generate_product_recommendations(args.user_id.as_deref(), &target)
                    .await?;
                answer("recommendations", recommendations, &target)
            }
            "ai_analyze_cart_abandonment" => {
                let args: TargetArgs = parse_args(action, args)?;
                let target = self.target(&args);
                let analysis = self.assistant.analyze_cart_abandonment(&target).await?;
                answer("analysis", analysis, &target)
            }
            "ai_business_insights" => {
                let args: TargetArgs = parse_args(action, args)?;
                let target = self.target(&args);
                let insights = self.assistant.generate_business_insights(&target).await?;
                answer("insights", insights, &target)
            }
            "ai_chat" => {
                let args: ChatArgs = parse_args(action, args)?;
                let target = self.target(&args.target);
                info!("Chat query via {}/{}", target.provider, target.model);
                let response = self
                    .assistant
                    .chat_with_data(&args.query, args.context.as_ref(), &target)
                    .await?;
                ToolResponse::json(&json!({
                    "query": args.query,
                    "response": response,
                    "provider": target.provider,
                    "model": target.model,
                    "timestamp": Utc::now().to_rfc3339(),
                }))
            }
            "ai_analyze_data" => {
                let args: DataArgs = parse_args(action, args)?;
                let target = self.target(&args.target);
                let analysis = self
                    .assistant
                    .analyze_with_provider(args.kind, &args.data, &target)
                    .await?;
                answer("analysis", analysis, &target)
            }
            "ai_providers" => ToolResponse::json(&json!({
                "providers": self.assistant.available_providers(),
                "timestamp": Utc::now().to_rfc3339(),
            })),
            _ => Err(ToolError::UnknownTool(action.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AssistantConfig, ProvidersConfig};
    use crate::db::MemoryStore;
    use crate::llm::transport::testing::FakeTransport;
    use crate::llm::{AdapterOptions, ChatDispatcher, ProviderRegistry};

    fn module_with(transport: Arc<FakeTransport>) -> AiModule {
        let registry = Arc::new(ProviderRegistry::from_config(&ProvidersConfig::default()));
        let dispatcher = Arc::new(ChatDispatcher::new(
            registry,
            transport,
            AdapterOptions::default(),
        ));
        let store = Arc::new(MemoryStore::with_sample_catalog());
        AiModule::new(Arc::new(AiAssistant::new(
            store,
            dispatcher,
            AssistantConfig::default(),
        )))
    }

    async fn call(module: &AiModule, action: &str, args: Value) -> Value {
        let response = module.handle_action(action, &args).await.unwrap();
        serde_json::from_str(response.first_text()).unwrap()
    }

    #[tokio::test]
    async fn test_chat_reports_resolved_target() {
        let transport = Arc::new(FakeTransport::ok(json!({"message": {"content": "Ten orders"}})));
        let module = module_with(transport.clone());

        let body = call(&module, "ai_chat", json!({"query": "How many orders?"})).await;
        assert_eq!(body["query"], "How many orders?");
        assert_eq!(body["response"], "Ten orders");
        assert_eq!(body["provider"], "ollama");
        assert_eq!(body["model"], "llama2");
        assert_eq!(transport.last_request().url.path(), "/api/chat");
    }

    #[tokio::test]
    async fn test_insights_and_analysis_fields() {
        let transport = Arc::new(FakeTransport::ok(json!({"message": {"content": "ok"}})));
        let module = module_with(transport);

        let insights = call(&module, "ai_business_insights", json!({})).await;
        assert_eq!(insights["insights"], "ok");

        let analysis = call(
            &module,
            "ai_analyze_data",
            json!({"type": "cart", "data": {"items": 3}, "model": "mistral"}),
        )
        .await;
        assert_eq!(analysis["analysis"], "ok");
        assert_eq!(analysis["model"], "mistral");
    }

    #[tokio::test]
    async fn test_unconfigured_provider_surfaces_assistant_error() {
        let transport = Arc::new(FakeTransport::ok(json!({})));
        let module = module_with(transport.clone());

        let err = module
            .handle_action("ai_analyze_products", &json!({"provider": "openai"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "configuration");
        assert!(err.to_string().starts_with("AI analysis failed"));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_providers_listing() {
        let module = module_with(Arc::new(FakeTransport::ok(json!({}))));
        let body = call(&module, "ai_providers", json!({})).await;
        let providers = body["providers"].as_array().unwrap();
        assert_eq!(providers.len(), 5);
        let ollama = providers.iter().find(|p| p["name"] == "ollama").unwrap();
        assert_eq!(ollama["displayName"], "Ollama");
        assert_eq!(ollama["configured"], true);
    }
}
