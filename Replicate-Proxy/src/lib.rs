//! # replicate-proxy
//!
//! Small relay that holds the Replicate API key server-side so browsers and
//! other untrusted clients can create and poll predictions without it.
//!
//! ## Routes
//!
//! - `POST /api/<name>` forwards the JSON body to `<api_base>/predictions`.
//! - `GET /api/<name>/{id}` forwards to `<api_base>/predictions/{id}`.
//!
//! Upstream status and body are mirrored. Every response carries permissive
//! CORS headers.
//!
//! ```no_run
//! use replicate_proxy::{app, ProxyConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProxyConfig::from_env()?;
//! let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
//! axum::serve(listener, app(config)).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum::middleware;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;

pub use config::ProxyConfig;
pub use error::{ProxyError, Result};
pub use state::ProxyState;

/// Build the relay router for `config`.
pub fn app(config: ProxyConfig) -> Router {
    let route = config.route();
    let state = Arc::new(ProxyState::new(config));

    Router::new()
        .route(
            &route,
            post(routes::create_prediction).fallback(routes::method_not_allowed),
        )
        .route(
            &format!("{}/{{id}}", route),
            get(routes::get_prediction).fallback(routes::method_not_allowed),
        )
        .layer(middleware::map_response(with_cors))
        .with_state(state)
}

async fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, GET, OPTIONS"),
    );
    response
}
