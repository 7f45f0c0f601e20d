use crate::db::Store;
use crate::errors::ToolError;
use crate::metrics::{MetricsFormat, MetricsService};
use crate::modules::{parse_args, Module, ModuleAction, ToolResponse};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub database: HealthStatus,
    pub metrics: HealthStatus,
}

/// Result of a health check
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub services: ServiceHealth,
    /// Seconds since the metrics service started
    pub uptime: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

#[derive(Debug, Deserialize)]
struct MetricsArgs {
    #[serde(default)]
    format: MetricsFormat,
}

#[derive(Debug)]
pub struct MonitoringModule {
    store: Arc<dyn Store>,
    metrics: Arc<MetricsService>,
}

impl MonitoringModule {
    pub fn new(store: Arc<dyn Store>, metrics: Arc<MetricsService>) -> Self {
        MonitoringModule { store, metrics }
    }

    /// Pings the store; a failed ping marks the whole service unhealthy
    pub fn health(&self) -> HealthReport {
        let ping = self
            .metrics
            .time_operation("ping", "database", || self.store.ping());
        let (status, database, error) = match ping {
            Ok(()) => (HealthStatus::Healthy, HealthStatus::Healthy, None),
            Err(e) => {
                warn!("Health check failed: {}", e);
                (
                    HealthStatus::Unhealthy,
                    HealthStatus::Unhealthy,
                    Some(e.to_string()),
                )
            }
        };
        HealthReport {
            status,
            timestamp: Utc::now(),
            services: ServiceHealth {
                database,
                metrics: HealthStatus::Healthy,
            },
            uptime: self.metrics.uptime_seconds(),
            error,
        }
    }
}

#[async_trait]
impl Module for MonitoringModule {
    fn name(&self) -> &str {
        "monitoring"
    }

    fn get_actions(&self) -> Vec<ModuleAction> {
        vec![
            ModuleAction::new(
                "get_metrics",
                "Get server metrics",
                json!({
                    "type": "object",
                    "properties": {
                        "format": {
                            "type": "string",
                            "enum": ["json", "prometheus"],
                            "description": "Output format for metrics",
                        },
                    },
                }),
            ),
            ModuleAction::new(
                "health_check",
                "Check server and database health",
                json!({"type": "object", "properties": {}}),
            ),
        ]
    }

    async fn handle_action(&self, action: &str, args: &Value) -> Result<ToolResponse, ToolError> {
        match action {
            "get_metrics" => {
                let MetricsArgs { format } = parse_args(action, args)?;
                Ok(ToolResponse::text(self.metrics.render(format)?))
            }
            "health_check" => ToolResponse::json(&self.health()),
            _ => Err(ToolError::UnknownTool(action.to_string())),
        }
    }
}
