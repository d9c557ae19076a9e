use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{ProxyError, Result};
use crate::state::ProxyState;

/// `POST /api/<name>`: create a prediction with the server's credential.
pub async fn create_prediction(
    State(state): State<Arc<ProxyState>>,
    body: Bytes,
) -> Result<Response> {
    let key = state.api_key()?;
    let payload: Value = serde_json::from_slice(&body)?;

    let url = format!("{}/predictions", state.config.api_base);
    info!(url = %url, "Relaying prediction create");
    let resp = state
        .http
        .post(&url)
        .timeout(state.config.timeout)
        .header("Authorization", format!("Token {}", key))
        .json(&payload)
        .send()
        .await?;

    mirror(resp).await
}

/// `GET /api/<name>/{id}`: read a prediction with the server's credential.
pub async fn get_prediction(
    State(state): State<Arc<ProxyState>>,
    Path(id): Path<String>,
) -> Result<Response> {
    if !is_prediction_id(&id) {
        return Err(ProxyError::InvalidId(id));
    }
    let key = state.api_key()?;

    let url = format!("{}/predictions/{}", state.config.api_base, id);
    debug!(url = %url, "Relaying prediction status");
    let resp = state
        .http
        .get(&url)
        .timeout(state.config.timeout)
        .header("Authorization", format!("Token {}", key))
        .send()
        .await?;

    mirror(resp).await
}

/// Replicate ids are one path segment of `[A-Za-z0-9_-]`.
fn is_prediction_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub async fn method_not_allowed() -> impl IntoResponse {
    (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

/// Pass the upstream status and body through untouched.
async fn mirror(resp: reqwest::Response) -> Result<Response> {
    let status = StatusCode::from_u16(resp.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| HeaderValue::from_bytes(v.as_bytes()).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));
    let body = resp.bytes().await?;

    if !status.is_success() {
        info!(status = status.as_u16(), "Upstream returned an error");
    }

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(header::CONTENT_TYPE, content_type);
    Ok(response)
}

impl ProxyState {
    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .ok_or(ProxyError::MissingCredential)
    }
}
