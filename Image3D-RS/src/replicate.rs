use std::env;
use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::adapter::{missing_field, normalize, read_poll, read_submission, AuthScheme, BackendAdapter};
use crate::encoder::{EncodedImage, ImageEncoding};
use crate::error::{GenerationError, Result};
use crate::types::{Backend, GenerationJob, JobStatus};

pub const DEFAULT_API_BASE: &str = "https://api.replicate.com/v1";

/// Where Replicate calls are sent.
#[derive(Clone)]
pub enum ReplicateRoute {
    /// Through the credential relay. Creation is `POST <url>`, status checks
    /// are `GET <url>/<id>`; the client never holds the key.
    Proxy { url: String },
    /// Straight to Replicate with a client-held token. Only for trusted hosts.
    Direct { api_base: String, token: String },
}

impl fmt::Debug for ReplicateRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicateRoute::Proxy { url } => f.debug_struct("Proxy").field("url", url).finish(),
            ReplicateRoute::Direct { api_base, .. } => f
                .debug_struct("Direct")
                .field("api_base", api_base)
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

/// Configuration for the Replicate predictions API.
#[derive(Debug, Clone)]
pub struct ReplicateConfig {
    /// Model version hash sent as `version`.
    pub version: String,
    pub route: ReplicateRoute,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl ReplicateConfig {
    /// Route through the relay at `proxy_url`.
    pub fn via_proxy(version: impl Into<String>, proxy_url: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            route: ReplicateRoute::Proxy {
                url: normalize(proxy_url.into()),
            },
            poll_interval: Duration::from_secs(3),
            timeout: Duration::from_secs(30),
        }
    }

    /// Call Replicate directly with `token`.
    pub fn direct(version: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            route: ReplicateRoute::Direct {
                api_base: DEFAULT_API_BASE.to_string(),
                token: token.into(),
            },
            poll_interval: Duration::from_secs(3),
            timeout: Duration::from_secs(30),
        }
    }

    /// Read configuration from the environment.
    ///
    /// `REPLICATE_MODEL_VERSION` is required. `REPLICATE_PROXY_URL` selects
    /// the relay route and wins over `REPLICATE_API_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let version = env::var("REPLICATE_MODEL_VERSION").map_err(|_| {
            GenerationError::Configuration("REPLICATE_MODEL_VERSION is not set".into())
        })?;

        if let Ok(proxy_url) = env::var("REPLICATE_PROXY_URL") {
            return Ok(Self::via_proxy(version, proxy_url));
        }

        let token = env::var("REPLICATE_API_TOKEN").map_err(|_| {
            GenerationError::Configuration(
                "Set REPLICATE_PROXY_URL (preferred) or REPLICATE_API_TOKEN".into(),
            )
        })?;
        let mut config = Self::direct(version, token);
        if let Ok(api_base) = env::var("REPLICATE_API_BASE") {
            config = config.with_api_base(api_base);
        }
        Ok(config)
    }

    /// Override the API base of a direct route. No effect on a proxy route.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        if let ReplicateRoute::Direct { api_base, .. } = &mut self.route {
            *api_base = normalize(base.into());
        }
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Adapter for Replicate predictions.
#[derive(Debug, Clone)]
pub struct ReplicateAdapter {
    http: Client,
    config: ReplicateConfig,
}

impl ReplicateAdapter {
    pub fn new(config: ReplicateConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    /// Use a custom `reqwest::Client` (for connection pooling, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn config(&self) -> &ReplicateConfig {
        &self.config
    }

    fn auth(&self) -> AuthScheme {
        match &self.config.route {
            ReplicateRoute::Proxy { .. } => AuthScheme::None,
            ReplicateRoute::Direct { token, .. } => AuthScheme::Token(token.clone()),
        }
    }

    fn create_url(&self) -> String {
        match &self.config.route {
            ReplicateRoute::Proxy { url } => url.clone(),
            ReplicateRoute::Direct { api_base, .. } => format!("{}/predictions", api_base),
        }
    }

    fn status_url(&self, job: &GenerationJob) -> Result<String> {
        match &self.config.route {
            ReplicateRoute::Proxy { url } => job
                .id
                .as_deref()
                .map(|id| format!("{}/{}", url, id))
                .ok_or_else(|| GenerationError::Poll("Replicate job has no id".into())),
            ReplicateRoute::Direct { .. } => job
                .poll_url
                .clone()
                .ok_or_else(|| GenerationError::Poll("Replicate job has no poll URL".into())),
        }
    }

    fn request_body(&self, image: &EncodedImage) -> Value {
        json!({
            "version": self.config.version,
            "input": { "image": image.data_uri() },
        })
    }

    /// Parse a creation response, requiring the field this route polls with.
    fn parse_created(&self, status: u16, json: &Value) -> Result<GenerationJob> {
        let job = parse_prediction(json);
        match &self.config.route {
            ReplicateRoute::Proxy { .. } if job.id.is_none() => Err(missing_field(status, json, "id")),
            ReplicateRoute::Direct { .. } if job.poll_url.is_none() => {
                Err(missing_field(status, json, "urls.get"))
            }
            _ => Ok(job),
        }
    }
}

fn map_status(status: &str) -> JobStatus {
    match status {
        "succeeded" => JobStatus::Succeeded,
        "failed" => JobStatus::Failed,
        "canceled" => JobStatus::Canceled,
        "starting" => JobStatus::Pending,
        _ => JobStatus::Processing,
    }
}

/// Read a prediction object into a job.
fn parse_prediction(json: &Value) -> GenerationJob {
    let status = json
        .get("status")
        .and_then(|v| v.as_str())
        .map(map_status)
        .unwrap_or(JobStatus::Pending);

    // `output` is a URL string for single-file models, a list for others.
    let result_url = json.get("output").and_then(|o| match o {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(|i| i.as_str().map(str::to_string)),
        _ => None,
    });

    GenerationJob {
        id: json.get("id").and_then(|v| v.as_str()).map(str::to_string),
        poll_url: json
            .pointer("/urls/get")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        status,
        result_url,
        error_message: json
            .get("error")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        progress: None,
    }
}

/// Read a status body. Unlike a creation body it must carry `status`.
fn parse_status(json: &Value) -> Result<GenerationJob> {
    if json.get("status").and_then(|v| v.as_str()).is_none() {
        return Err(GenerationError::Poll(format!(
            "Unparseable status body (no status): {}",
            json
        )));
    }
    Ok(parse_prediction(json))
}

impl BackendAdapter for ReplicateAdapter {
    fn backend(&self) -> Backend {
        Backend::Replicate
    }

    fn encoding(&self) -> ImageEncoding {
        ImageEncoding::DataUri
    }

    fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    async fn submit(&self, image: &EncodedImage) -> Result<GenerationJob> {
        let url = self.create_url();
        info!(url = %url, file = %image.file_name, "Creating Replicate prediction");
        let request = self
            .http
            .post(&url)
            .timeout(self.config.timeout)
            .json(&self.request_body(image));
        let resp = self
            .auth()
            .apply(request)
            .send()
            .await
            .map_err(|e| GenerationError::Network {
                context: format!("Cannot reach Replicate at {}", url),
                source: e,
            })?;

        let (status, json) = read_submission(resp).await?;
        let job = self.parse_created(status, &json)?;
        debug!(job = job.label(), status = %job.status, "Replicate prediction created");
        Ok(job)
    }

    async fn poll(&self, job: &GenerationJob) -> Result<GenerationJob> {
        let url = self.status_url(job)?;
        let request = self.http.get(&url).timeout(self.config.timeout);
        let resp = self
            .auth()
            .apply(request)
            .send()
            .await
            .map_err(|e| GenerationError::Poll(format!("Cannot reach {}: {}", url, e)))?;

        let json = read_poll(resp).await?;
        let mut updated = parse_status(&json)?;
        // Keep the handles we polled with if the status body omits them.
        if updated.id.is_none() {
            updated.id = job.id.clone();
        }
        if updated.poll_url.is_none() {
            updated.poll_url = job.poll_url.clone();
        }
        Ok(updated)
    }
}
