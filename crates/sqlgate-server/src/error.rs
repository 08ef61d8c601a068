//! HTTP-facing error type.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use sqlgate_core::{GenerationError, error_response};
use thiserror::Error;

use crate::forwarding::RegistryError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The body parsed but cannot be turned into SQL.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// The body is not JSON.
    #[error("Invalid JSON body: {0}")]
    InvalidJson(String),

    /// The query string does not parse.
    #[error("Invalid query string: {0}")]
    InvalidQuery(String),

    /// A route-table replacement failed validation.
    #[error("Invalid forwarding tables: {0}")]
    InvalidTables(#[from] RegistryError),

    /// No handler for the method and path.
    #[error("No route for {method} {path}")]
    RouteNotFound { method: String, path: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Generation(err) => (StatusCode::BAD_REQUEST, error_response(err)),
            Self::InvalidJson(_) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "success": false,
                    "error": self.to_string(),
                    "help": "Send a JSON object, an array of objects, or a procedure call descriptor",
                    "example": {"tableName": "usuarios", "id": 1, "nombre": "Juan"},
                }),
            ),
            Self::InvalidQuery(_) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "success": false,
                    "error": self.to_string(),
                    "help": "forward accepts true or false",
                    "example": "/api/generate?forward=false",
                }),
            ),
            Self::InvalidTables(_) => (
                StatusCode::BAD_REQUEST,
                json!({"success": false, "error": self.to_string()}),
            ),
            Self::RouteNotFound { .. } => (
                StatusCode::NOT_FOUND,
                json!({"success": false, "error": self.to_string()}),
            ),
        };

        if status.is_client_error() {
            tracing::debug!(status = %status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let res = ApiError::from(GenerationError::EmptyArray).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = ApiError::InvalidJson("eof".into()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = ApiError::InvalidQuery("bad bool".into()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = ApiError::RouteNotFound {
            method: "GET".into(),
            path: "/nope".into(),
        }
        .into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
