use crate::assistant::AiAssistant;
use crate::db::Store;
use crate::errors::ToolError;
use crate::metrics::MetricsService;
use crate::modules::{
    AiModule, AnalyticsModule, CartModule, HealthReport, Module, ModuleAction, MonitoringModule,
    ProductModule, ToolResponse, UserModule,
};
use jsonschema::Validator;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Metric label for calls naming a tool that is not registered
const UNKNOWN_TOOL_LABEL: &str = "unknown";

/// Where a tool lives and how its arguments are checked
struct ToolEntry {
    module: usize,
    validator: Validator,
}

/// Owns the tool modules and routes tool calls to them
pub struct ModulesManager {
    /// Loaded module instances, in listing order
    pub modules: Vec<Box<dyn Module>>,
    tools: HashMap<String, ToolEntry>,
    monitor: Option<Arc<MonitoringModule>>,
    metrics: Arc<MetricsService>,
}

impl fmt::Debug for ModulesManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModulesManager")
            .field("modules", &self.modules)
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ModulesManager {
    /// Registers the modules and compiles every tool's argument schema
    ///
    /// # Arguments
    /// * `modules` - Module instances to expose
    /// * `metrics` - Shared metrics service recording every call
    ///
    /// # Returns
    /// * `Result<ModulesManager, ToolError>` - Fails when a schema does not compile
    ///   or two modules declare the same tool
    pub fn new(
        modules: Vec<Box<dyn Module>>,
        metrics: Arc<MetricsService>,
    ) -> Result<Self, ToolError> {
        let mut tools: HashMap<String, ToolEntry> = HashMap::new();
        for (index, module) in modules.iter().enumerate() {
            let actions = module.get_actions();
            debug!("Module {} exposes {} tools", module.name(), actions.len());
            for action in actions {
                let validator = jsonschema::validator_for(&action.input_schema).map_err(|e| {
                    ToolError::Schema {
                        tool: action.name.clone(),
                        message: e.to_string(),
                    }
                })?;
                let entry = ToolEntry {
                    module: index,
                    validator,
                };
                if let Some(previous) = tools.insert(action.name.clone(), entry) {
                    return Err(ToolError::Schema {
                        tool: action.name,
                        message: format!(
                            "declared by both {} and {}",
                            modules[previous.module].name(),
                            module.name()
                        ),
                    });
                }
            }
        }
        debug!("Loaded modules: {:?}", modules);
        info!("Registered {} tools", tools.len());
        Ok(ModulesManager {
            modules,
            tools,
            monitor: None,
            metrics,
        })
    }

    /// Builds the manager with every storefront module
    pub fn with_defaults(
        store: Arc<dyn Store>,
        assistant: Arc<AiAssistant>,
        metrics: Arc<MetricsService>,
    ) -> Result<Self, ToolError> {
        let monitor = Arc::new(MonitoringModule::new(store.clone(), metrics.clone()));
        let modules: Vec<Box<dyn Module>> = vec![
            Box::new(ProductModule::new(store.clone(), metrics.clone())),
            Box::new(CartModule::new(store.clone(), metrics.clone())),
            Box::new(UserModule::new(store.clone(), metrics.clone())),
            Box::new(AnalyticsModule::new(store, metrics.clone())),
            Box::new(monitor.clone()),
            Box::new(AiModule::new(assistant)),
        ];
        let mut manager = Self::new(modules, metrics)?;
        manager.monitor = Some(monitor);
        Ok(manager)
    }

    /// Every tool of every module, in registration order
    pub fn list_tools(&self) -> Vec<ModuleAction> {
        self.modules.iter().flat_map(|m| m.get_actions()).collect()
    }

    pub fn metrics(&self) -> &Arc<MetricsService> {
        &self.metrics
    }

    /// Health report from the monitoring module, when one is loaded
    pub fn health(&self) -> Option<HealthReport> {
        self.monitor.as_ref().map(|m| m.health())
    }

    /// Validates the arguments, runs the tool and records the outcome
    ///
    /// # Arguments
    /// * `name` - Tool name
    /// * `args` - Tool arguments; `null` is treated as an empty object
    pub async fn call(&self, name: &str, args: Value) -> Result<ToolResponse, ToolError> {
        let _connection = self.metrics.track_connection();
        let start = Instant::now();
        let result = self.dispatch(name, args).await;
        let elapsed = start.elapsed().as_secs_f64();

        // Caller-supplied names must not mint new series
        let label = if self.tools.contains_key(name) {
            name
        } else {
            UNKNOWN_TOOL_LABEL
        };
        self.metrics.record_request(label, result.is_ok(), elapsed);
        match &result {
            Ok(_) => debug!("Tool {} completed in {:.3}s", name, elapsed),
            Err(e) => {
                self.metrics.record_error(label, e.kind());
                warn!("Tool {} failed: {}", name, e);
            }
        }
        result
    }

    async fn dispatch(&self, name: &str, args: Value) -> Result<ToolResponse, ToolError> {
        let entry = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let args = if args.is_null() { json!({}) } else { args };

        let problems: Vec<String> = entry
            .validator
            .iter_errors(&args)
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect();
        if !problems.is_empty() {
            return Err(ToolError::invalid(name, problems.join("; ")));
        }

        let module = self
            .modules
            .get(entry.module)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        module.handle_action(name, &args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AssistantConfig, ProvidersConfig};
    use crate::db::MemoryStore;
    use crate::llm::transport::testing::FakeTransport;
    use crate::llm::{AdapterOptions, ChatDispatcher, ProviderRegistry};
    use crate::metrics::MetricsFormat;

    fn manager_with(transport: Arc<FakeTransport>) -> ModulesManager {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::with_sample_catalog());
        let registry = Arc::new(ProviderRegistry::from_config(&ProvidersConfig::default()));
        let dispatcher = Arc::new(ChatDispatcher::new(
            registry,
            transport,
            AdapterOptions::default(),
        ));
        let assistant = Arc::new(AiAssistant::new(
            store.clone(),
            dispatcher,
            AssistantConfig::default(),
        ));
        let metrics = Arc::new(MetricsService::new().unwrap());
        ModulesManager::with_defaults(store, assistant, metrics).unwrap()
    }

    fn manager() -> ModulesManager {
        manager_with(Arc::new(FakeTransport::ok(json!({"message": {"content": "ok"}}))))
    }

    fn payload(response: &ToolResponse) -> Value {
        serde_json::from_str(response.first_text()).unwrap()
    }

    #[test]
    fn test_lists_every_tool_once() {
        let manager = manager();
        let names: Vec<String> = manager.list_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names.len(), 21);
        for expected in ["get_products", "add_to_cart", "get_analytics", "health_check", "ai_chat"] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }
        let modules: Vec<&str> = manager.modules.iter().map(|m| m.name()).collect();
        assert_eq!(
            modules,
            vec!["products", "carts", "users", "analytics", "monitoring", "ai"]
        );
        assert!(manager.health().unwrap().is_healthy());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_counted() {
        let manager = manager();
        let err = manager.call("make_coffee", Value::Null).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
        manager.call("brew_tea", json!({})).await.unwrap_err();

        let metrics = manager.metrics();
        assert_eq!(metrics.error_count("unknown", "unknown_tool"), 2);
        assert_eq!(metrics.request_count("unknown", "error"), 2);
        let text = metrics.render(MetricsFormat::Prometheus).unwrap();
        assert!(!text.contains("make_coffee"));
        assert!(!text.contains("brew_tea"));
    }

    #[test]
    fn test_duplicate_tool_names_are_rejected() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let metrics = Arc::new(MetricsService::new().unwrap());
        let modules: Vec<Box<dyn Module>> = vec![
            Box::new(ProductModule::new(store.clone(), metrics.clone())),
            Box::new(ProductModule::new(store, metrics.clone())),
        ];
        let err = ModulesManager::new(modules, metrics).unwrap_err();
        assert_eq!(err.kind(), "schema");
        assert!(err.to_string().contains("declared by both products and products"));
    }

    #[tokio::test]
    async fn test_arguments_are_validated_before_dispatch() {
        let manager = manager();
        let err = manager
            .call("create_product", json!({"name": "Hat", "price": -5}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_arguments");

        let err = manager
            .call("add_to_cart", json!({"productId": "7", "quantity": 1i64 << 50}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_arguments");
        assert!(err.to_string().contains("10000"));

        let err = manager
            .call(
                "update_product",
                json!({"id": "1", "price": 1i64 << 62}),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_arguments");

        let err = manager.call("ai_chat", json!({})).await.unwrap_err();
        assert!(err.to_string().contains("query"));

        let err = manager
            .call("get_analytics", json!({"type": "weekly"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_arguments");
        assert_eq!(manager.metrics().error_count("get_analytics", "invalid_arguments"), 1);
    }

    #[tokio::test]
    async fn test_cart_flow_through_manager() {
        let manager = manager();
        let added = manager
            .call("add_to_cart", json!({"productId": "7", "quantity": 2}))
            .await
            .unwrap();
        let cart_id = payload(&added)["cartId"].as_str().unwrap().to_string();

        let cart = manager
            .call("get_cart", json!({"cartId": cart_id}))
            .await
            .unwrap();
        assert_eq!(payload(&cart)["summary"]["totalPrice"], 2 * 89900);

        let overview = manager.call("get_analytics", Value::Null).await.unwrap();
        assert_eq!(payload(&overview)["overview"]["totalCartItems"], 1);
        assert_eq!(manager.metrics().request_count("get_cart", "success"), 1);
    }

    #[tokio::test]
    async fn test_ai_tool_reaches_provider() {
        let transport = Arc::new(FakeTransport::ok(json!({"message": {"content": "Buy scarves"}})));
        let manager = manager_with(transport.clone());

        let response = manager
            .call("ai_generate_recommendations", json!({"provider": "ollama"}))
            .await
            .unwrap();
        assert_eq!(payload(&response)["recommendations"], "Buy scarves");
        assert_eq!(transport.requests().len(), 1);

        let err = manager
            .call("ai_chat", json!({"query": "hi", "provider": "mystery"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_arguments");
        assert_eq!(transport.requests().len(), 1);
    }
}
