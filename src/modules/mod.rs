mod ai_module;
mod analytics_module;
mod cart_module;
mod module_manager;
mod monitoring_module;
mod product_module;
mod user_module;

pub use ai_module::*;
pub use analytics_module::*;
pub use cart_module::*;
pub use module_manager::*;
pub use monitoring_module::*;
pub use product_module::*;
pub use user_module::*;

use crate::errors::ToolError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool exposed by a module, with the JSON Schema of its arguments
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleAction {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ModuleAction {
    pub fn new(name: &str, description: &str, input_schema: Value) -> Self {
        ModuleAction {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }
}

impl std::fmt::Display for ModuleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.name, self.description)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// Result of a tool call: a single text block holding pretty-printed JSON
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolResponse {
    pub content: Vec<ToolContent>,
}

impl ToolResponse {
    pub fn text(text: impl Into<String>) -> Self {
        ToolResponse {
            content: vec![ToolContent {
                kind: "text".to_string(),
                text: text.into(),
            }],
        }
    }

    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ToolError> {
        Ok(Self::text(serde_json::to_string_pretty(value)?))
    }

    /// Text of the first block, empty when there is none
    pub fn first_text(&self) -> &str {
        self.content.first().map_or("", |c| c.text.as_str())
    }
}

#[async_trait::async_trait]
pub trait Module: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &str;
    fn get_actions(&self) -> Vec<ModuleAction>;
    async fn handle_action(&self, action: &str, args: &Value) -> Result<ToolResponse, ToolError>;
}

#[async_trait::async_trait]
impl<M: Module + ?Sized> Module for std::sync::Arc<M> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get_actions(&self) -> Vec<ModuleAction> {
        (**self).get_actions()
    }

    async fn handle_action(&self, action: &str, args: &Value) -> Result<ToolResponse, ToolError> {
        (**self).handle_action(action, args).await
    }
}

/// Deserializes validated tool arguments into a typed struct
pub(crate) fn parse_args<T: DeserializeOwned>(tool: &str, args: &Value) -> Result<T, ToolError> {
    serde_json::from_value(args.clone()).map_err(|e| ToolError::invalid(tool, e.to_string()))
}
