use crate::assistant::AssistantError;
use crate::metrics::MetricsError;
use diesel::r2d2::PoolError;
use diesel::result::Error as DieselError;

/// Errors raised by the storage backends
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Diesel error: {0}")]
    DieselError(#[from] DieselError),
    #[error("Connection pool error: {0}")]
    PoolError(#[from] PoolError),
    #[error("Connection error: {0}")]
    ConnectionError(#[from] diesel::ConnectionError),
    #[error("{entity} with ID {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("Invalid input: {0}")]
    Invalid(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

/// Errors returned by tool calls
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
    #[error("Invalid input schema for {tool}: {message}")]
    Schema { tool: String, message: String },
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Store(StoreError),
    #[error(transparent)]
    Assistant(#[from] AssistantError),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

impl From<StoreError> for ToolError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ToolError::NotFound(err.to_string()),
            other => ToolError::Store(other),
        }
    }
}

impl ToolError {
    pub fn invalid(tool: &str, message: impl Into<String>) -> Self {
        ToolError::InvalidArguments {
            tool: tool.to_string(),
            message: message.into(),
        }
    }

    /// Short label used for metrics and HTTP status mapping
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::InvalidArguments { .. } => "invalid_arguments",
            ToolError::Schema { .. } => "schema",
            ToolError::NotFound(_) => "not_found",
            ToolError::Store(StoreError::Invalid(_)) => "invalid_input",
            ToolError::Store(_) => "store",
            ToolError::Assistant(e) => e.cause.kind(),
            ToolError::Serialize(_) => "serialize",
            ToolError::Metrics(_) => "metrics",
        }
    }
}
