//! API routes configuration module

use crate::api::handlers::{api_analytics, api_products, call_tool, health, list_tools, metrics};
use crate::modules::ModulesManager;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;

/// Creates and configures the API router with all routes
///
/// # Arguments
/// * `manager` - Tool manager shared across handlers
///
/// # Returns
/// * `Router` - Configured router with all API endpoints
pub fn app(manager: Arc<ModulesManager>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/tools", get(list_tools))
        .route("/tools/call", post(call_tool))
        .route("/api/products", get(api_products))
        .route("/api/analytics", get(api_analytics))
        .layer(Extension(manager))
}
