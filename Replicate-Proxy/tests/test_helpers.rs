#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use replicate_proxy::{app, ProxyConfig};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// One request seen by the fake Replicate API.
#[derive(Debug, Clone)]
pub struct Seen {
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

#[derive(Clone, Default)]
pub struct Upstream {
    pub seen: Arc<Mutex<Vec<Seen>>>,
}

impl Upstream {
    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    fn record(&self, path: String, headers: &HeaderMap, body: Option<Value>) {
        self.seen.lock().unwrap().push(Seen {
            path,
            authorization: headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body,
        });
    }
}

async fn create(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    upstream.record("/v1/predictions".into(), &headers, Some(body.clone()));
    if body.get("version").is_none() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "detail": "version is required" })),
        );
    }
    (
        StatusCode::CREATED,
        Json(json!({ "id": "p1", "status": "starting" })),
    )
}

async fn fetch(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    upstream.record(format!("/v1/predictions/{}", id), &headers, None);
    if id != "p1" {
        return (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." })));
    }
    (
        StatusCode::OK,
        Json(json!({ "id": id, "status": "succeeded", "output": ["https://cdn/p1.glb"] })),
    )
}

/// Any other upstream path, so a leaked request would be recorded.
async fn other(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    uri: Uri,
) -> impl IntoResponse {
    upstream.record(uri.path().to_string(), &headers, None);
    (StatusCode::OK, Json(json!({ "username": "owner" })))
}

/// Fake Replicate API; returns its `/v1` base URL.
pub async fn spawn_upstream(upstream: Upstream) -> String {
    let router = Router::new()
        .route("/v1/predictions", post(create))
        .route("/v1/predictions/{id}", get(fetch))
        .fallback(other)
        .with_state(upstream);
    format!("{}/v1", serve(router).await)
}

/// Run the relay against `api_base`; returns its base URL.
pub async fn spawn_proxy(config: ProxyConfig) -> String {
    serve(app(config)).await
}

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    base
}
