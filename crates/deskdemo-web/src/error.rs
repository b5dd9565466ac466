//! Error types for the web server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use deskdemo_core::ValidationError;

/// Message returned for every failure that is not the caller's fault.
const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Errors that can occur while handling a request.
#[derive(Debug, Error)]
pub enum WebError {
    /// The request was rejected before reaching the agent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No desktop app has this id.
    #[error("unknown app: {0}")]
    UnknownApp(String),

    /// The agent could not be started.
    #[error("agent error: {0}")]
    Agent(#[from] deskdemo_claude::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            WebError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            WebError::UnknownApp(_) => (StatusCode::NOT_FOUND, self.to_string()),
            WebError::Agent(_) | WebError::Io(_) => {
                error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_ERROR_MESSAGE.to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
