use prometheus::proto::MetricType;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;

const REQUEST_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.0, 5.0, 10.0];
const QUERY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 2.0];

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("metrics registry error: {0}")]
    Registry(#[from] prometheus::Error),
    #[error("metrics output is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
    #[error("cannot serialize metrics: {0}")]
    Json(#[from] serde_json::Error),
}

/// Output format of `MetricsService::render`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricsFormat {
    #[default]
    Json,
    Prometheus,
}

/// Request and storage metrics kept in a private prometheus registry
#[derive(Debug)]
pub struct MetricsService {
    registry: Registry,
    requests: IntCounterVec,
    request_duration: HistogramVec,
    errors: IntCounterVec,
    active_connections: IntGauge,
    database_queries: IntCounterVec,
    database_query_duration: HistogramVec,
    started: Instant,
}

impl MetricsService {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("mcp_requests_total", "Total number of MCP requests"),
            &["tool", "status"],
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "mcp_request_duration_seconds",
                "Duration of MCP requests in seconds",
            )
            .buckets(REQUEST_BUCKETS.to_vec()),
            &["tool"],
        )?;
        let errors = IntCounterVec::new(
            Opts::new("mcp_errors_total", "Total number of MCP errors"),
            &["tool", "error_type"],
        )?;
        let active_connections = IntGauge::new(
            "mcp_active_connections",
            "Number of active MCP connections",
        )?;
        let database_queries = IntCounterVec::new(
            Opts::new("database_queries_total", "Total number of database queries"),
            &["operation", "table"],
        )?;
        let database_query_duration = HistogramVec::new(
            HistogramOpts::new(
                "database_query_duration_seconds",
                "Duration of database queries in seconds",
            )
            .buckets(QUERY_BUCKETS.to_vec()),
            &["operation", "table"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(active_connections.clone()))?;
        registry.register(Box::new(database_queries.clone()))?;
        registry.register(Box::new(database_query_duration.clone()))?;

        Ok(MetricsService {
            registry,
            requests,
            request_duration,
            errors,
            active_connections,
            database_queries,
            database_query_duration,
            started: Instant::now(),
        })
    }

    pub fn record_request(&self, tool: &str, success: bool, seconds: f64) {
        let status = if success { "success" } else { "error" };
        self.requests.with_label_values(&[tool, status]).inc();
        self.request_duration
            .with_label_values(&[tool])
            .observe(seconds);
    }

    pub fn record_error(&self, tool: &str, error_type: &str) {
        self.errors.with_label_values(&[tool, error_type]).inc();
    }

    /// Counts a connection as active until the guard is dropped
    pub fn track_connection(&self) -> ConnectionGuard {
        self.active_connections.inc();
        ConnectionGuard {
            gauge: self.active_connections.clone(),
        }
    }

    /// Runs a storage call, counting it and observing its duration whether it fails or not
    pub fn time_operation<T, E>(
        &self,
        operation: &str,
        table: &str,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        self.database_queries
            .with_label_values(&[operation, table])
            .inc();
        let start = Instant::now();
        let result = f();
        self.database_query_duration
            .with_label_values(&[operation, table])
            .observe(start.elapsed().as_secs_f64());
        result
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    #[cfg(test)]
    pub fn request_count(&self, tool: &str, status: &str) -> u64 {
        self.requests.with_label_values(&[tool, status]).get()
    }

    #[cfg(test)]
    pub fn error_count(&self, tool: &str, error_type: &str) -> u64 {
        self.errors.with_label_values(&[tool, error_type]).get()
    }

    pub fn render(&self, format: MetricsFormat) -> Result<String, MetricsError> {
        match format {
            MetricsFormat::Prometheus => self.render_prometheus(),
            MetricsFormat::Json => Ok(serde_json::to_string_pretty(&self.to_json())?),
        }
    }

    pub fn render_prometheus(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// One entry per metric family with its labelled samples
    pub fn to_json(&self) -> Value {
        let families: Vec<Value> = self
            .registry
            .gather()
            .iter()
            .map(|family| {
                let kind = family.get_field_type();
                let values: Vec<Value> = family
                    .get_metric()
                    .iter()
                    .map(|metric| {
                        let labels: serde_json::Map<String, Value> = metric
                            .get_label()
                            .iter()
                            .map(|pair| {
                                (
                                    pair.get_name().to_string(),
                                    Value::String(pair.get_value().to_string()),
                                )
                            })
                            .collect();
                        match kind {
                            MetricType::COUNTER => json!({
                                "labels": labels,
                                "value": metric.get_counter().get_value(),
                            }),
                            MetricType::GAUGE => json!({
                                "labels": labels,
                                "value": metric.get_gauge().get_value(),
                            }),
                            MetricType::HISTOGRAM => {
                                let histogram = metric.get_histogram();
                                json!({
                                    "labels": labels,
                                    "count": histogram.get_sample_count(),
                                    "sum": histogram.get_sample_sum(),
                                })
                            }
                            _ => json!({ "labels": labels }),
                        }
                    })
                    .collect();
                json!({
                    "name": family.get_name(),
                    "help": family.get_help(),
                    "type": format!("{:?}", kind).to_lowercase(),
                    "values": values,
                })
            })
            .collect();
        Value::Array(families)
    }
}

/// Decrements the active connection gauge on drop
#[derive(Debug)]
pub struct ConnectionGuard {
    gauge: IntGauge,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_and_error_counters() {
        let metrics = MetricsService::new().unwrap();
        metrics.record_request("get_products", true, 0.02);
        metrics.record_request("get_products", false, 0.3);
        metrics.record_error("get_products", "store");

        assert_eq!(metrics.request_count("get_products", "success"), 1);
        assert_eq!(metrics.request_count("get_products", "error"), 1);
        assert_eq!(metrics.error_count("get_products", "store"), 1);
    }

    #[test]
    fn test_time_operation_passes_result_through() {
        let metrics = MetricsService::new().unwrap();
        let ok: Result<u32, String> = metrics.time_operation("select", "products", || Ok(3));
        assert_eq!(ok, Ok(3));
        let err: Result<u32, String> =
            metrics.time_operation("select", "products", || Err("boom".to_string()));
        assert_eq!(err, Err("boom".to_string()));

        let text = metrics.render(MetricsFormat::Prometheus).unwrap();
        assert!(text.contains(
            "database_queries_total{operation=\"select\",table=\"products\"} 2"
        ));
        assert!(text.contains("database_query_duration_seconds_count"));
    }

    #[test]
    fn test_connection_guard() {
        let metrics = MetricsService::new().unwrap();
        {
            let _guard = metrics.track_connection();
            assert!(metrics
                .render_prometheus()
                .unwrap()
                .contains("mcp_active_connections 1"));
        }
        assert!(metrics
            .render_prometheus()
            .unwrap()
            .contains("mcp_active_connections 0"));
    }

    #[test]
    fn test_json_rendering() {
        let metrics = MetricsService::new().unwrap();
        metrics.record_error("ai_chat", "llm");
        let value: Value =
            serde_json::from_str(&metrics.render(MetricsFormat::Json).unwrap()).unwrap();
        let errors = value
            .as_array()
            .unwrap()
            .iter()
            .find(|family| family["name"] == "mcp_errors_total")
            .unwrap();
        assert_eq!(errors["type"], "counter");
        assert_eq!(errors["values"][0]["labels"]["error_type"], "llm");
        assert_eq!(errors["values"][0]["value"], 1.0);
    }
}
