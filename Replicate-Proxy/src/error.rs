use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors raised while relaying a request.
///
/// A rejected prediction id becomes `400 {"detail": ...}`; every other
/// request-time variant becomes `500 {"detail": ...}`.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// `REPLICATE_API_KEY` was not provided to the server.
    #[error("Server configuration error: Replicate API key missing.")]
    MissingCredential,

    /// The client body was not JSON.
    #[error("Proxy error: {0}")]
    InvalidBody(#[from] serde_json::Error),

    /// The prediction id is not a single plain path segment.
    #[error("Proxy error: invalid prediction id '{0}'")]
    InvalidId(String),

    /// Replicate could not be reached or its body could not be read.
    #[error("Proxy error: {0}")]
    Upstream(#[from] reqwest::Error),

    /// Malformed server settings, raised at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, ProxyError>;

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match self {
            ProxyError::InvalidId(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!(error = %self, status = status.as_u16(), "Relay failed");
        (
            status,
            Json(json!({ "detail": self.to_string() })),
        )
            .into_response()
    }
}
