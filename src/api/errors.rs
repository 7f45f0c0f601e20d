use crate::errors::ToolError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
    pub code: u16,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiError({}, {})", self.code, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::Json(self);
        (status, body).into_response()
    }
}

impl From<ToolError> for ApiError {
    fn from(err: ToolError) -> Self {
        let status = match err.kind() {
            "unknown_tool" | "not_found" => StatusCode::NOT_FOUND,
            "invalid_arguments" | "invalid_input" => StatusCode::BAD_REQUEST,
            "store" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        api_error(status, &err.to_string())
    }
}

/// Helper function to create API errors
pub fn api_error(status: StatusCode, message: &str) -> ApiError {
    ApiError {
        message: message.to_string(),
        code: status.as_u16(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_errors_map_to_status_codes() {
        let cases = [
            (ToolError::UnknownTool("x".to_string()), 404),
            (ToolError::NotFound("User not found".to_string()), 404),
            (ToolError::invalid("get_cart", "bad"), 400),
            (
                ToolError::from(crate::errors::StoreError::Invalid("neg".to_string())),
                400,
            ),
            (
                ToolError::Schema {
                    tool: "t".to_string(),
                    message: "m".to_string(),
                },
                500,
            ),
        ];
        for (err, code) in cases {
            assert_eq!(ApiError::from(err).code, code);
        }
    }
}
