use crate::api::errors::{api_error, ApiError};
use crate::modules::{HealthReport, ModuleAction, ModulesManager, ToolResponse};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{
    extract::{Extension, Query},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Request payload of `POST /tools/call`
#[derive(Debug, Deserialize)]
pub struct CallToolRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Serialize)]
pub struct ToolList {
    pub tools: Vec<ModuleAction>,
}

/// Query string of `GET /api/products`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub search: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
}

impl ProductQuery {
    fn into_arguments(self) -> Value {
        let mut args = Map::new();
        if let Some(limit) = self.limit {
            args.insert("limit".to_string(), json!(limit));
        }
        if let Some(offset) = self.offset {
            args.insert("offset".to_string(), json!(offset));
        }
        if let Some(search) = self.search {
            args.insert("search".to_string(), json!(search));
        }
        if let Some(min) = self.min_price {
            args.insert("minPrice".to_string(), json!(min));
        }
        if let Some(max) = self.max_price {
            args.insert("maxPrice".to_string(), json!(max));
        }
        Value::Object(args)
    }
}

/// Parses the JSON text a tool returned
fn tool_json(response: &ToolResponse) -> Result<Value, ApiError> {
    serde_json::from_str(response.first_text())
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()))
}

/// Reports store and metrics health; 503 when the store is unreachable
#[axum::debug_handler]
pub async fn health(
    Extension(manager): Extension<Arc<ModulesManager>>,
) -> Result<(StatusCode, Json<HealthReport>), ApiError> {
    let report = manager
        .health()
        .ok_or_else(|| api_error(StatusCode::SERVICE_UNAVAILABLE, "Monitoring is not loaded"))?;
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok((status, Json(report)))
}

/// Prometheus text exposition of every registered metric
#[axum::debug_handler]
pub async fn metrics(
    Extension(manager): Extension<Arc<ModulesManager>>,
) -> Result<impl IntoResponse, ApiError> {
    let body = manager
        .metrics()
        .render_prometheus()
        .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to collect metrics"))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    ))
}

#[axum::debug_handler]
pub async fn list_tools(Extension(manager): Extension<Arc<ModulesManager>>) -> Json<ToolList> {
    Json(ToolList {
        tools: manager.list_tools(),
    })
}

/// Runs one tool and returns its content blocks
#[axum::debug_handler]
pub async fn call_tool(
    Extension(manager): Extension<Arc<ModulesManager>>,
    Json(request): Json<CallToolRequest>,
) -> Result<Json<ToolResponse>, ApiError> {
    let response = manager.call(&request.name, request.arguments).await?;
    Ok(Json(response))
}

/// Product listing for chatbot integrations
#[axum::debug_handler]
pub async fn api_products(
    Extension(manager): Extension<Arc<ModulesManager>>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Value>, ApiError> {
    let response = manager
        .call("get_products", query.into_arguments())
        .await?;
    Ok(Json(tool_json(&response)?))
}

/// Overview analytics for chatbot integrations
#[axum::debug_handler]
pub async fn api_analytics(
    Extension(manager): Extension<Arc<ModulesManager>>,
) -> Result<Json<Value>, ApiError> {
    let response = manager
        .call("get_analytics", json!({"type": "overview"}))
        .await?;
    Ok(Json(tool_json(&response)?))
}
