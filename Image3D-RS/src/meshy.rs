use std::env;
use std::time::Duration;

use reqwest::multipart::Form;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::adapter::{missing_field, normalize, read_poll, read_submission, AuthScheme, BackendAdapter};
use crate::encoder::{EncodedImage, ImageEncoding};
use crate::error::{GenerationError, Result};
use crate::types::{Backend, GenerationJob, JobStatus};

pub const DEFAULT_ENDPOINT: &str = "https://api.meshy.ai/v1/image-to-3d";

/// Configuration for the Meshy image-to-3d task API.
#[derive(Debug, Clone)]
pub struct MeshyConfig {
    /// Task collection URL. Tasks are created by POST and read at `<endpoint>/<id>`.
    pub endpoint: String,
    pub auth: AuthScheme,
    /// `DataUri` sends `{"image_url": ...}`; `Multipart` sends an `image_file` field.
    pub upload: ImageEncoding,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl MeshyConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            auth: AuthScheme::Bearer(api_key.into()),
            upload: ImageEncoding::DataUri,
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(60),
        }
    }

    /// Read `MESHY_API_KEY` (required), `MESHY_ENDPOINT` and `MESHY_UPLOAD`.
    pub fn from_env() -> Result<Self> {
        let key = env::var("MESHY_API_KEY")
            .map_err(|_| GenerationError::Configuration("MESHY_API_KEY is not set".into()))?;
        let mut config = Self::new(key);
        if let Ok(endpoint) = env::var("MESHY_ENDPOINT") {
            config = config.with_endpoint(endpoint);
        }
        if let Ok(upload) = env::var("MESHY_UPLOAD") {
            config.upload = match upload.trim().to_ascii_lowercase().as_str() {
                "json" | "data-uri" => ImageEncoding::DataUri,
                "multipart" => ImageEncoding::Multipart,
                other => {
                    return Err(GenerationError::Configuration(format!(
                        "MESHY_UPLOAD must be json or multipart, got '{}'",
                        other
                    )))
                }
            };
        }
        Ok(config)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = normalize(endpoint.into());
        self
    }

    pub fn with_upload(mut self, upload: ImageEncoding) -> Self {
        self.upload = upload;
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

/// Adapter for Meshy, polled at `GET <endpoint>/<task id>`.
#[derive(Debug, Clone)]
pub struct MeshyAdapter {
    http: Client,
    config: MeshyConfig,
}

impl MeshyAdapter {
    pub fn new(config: MeshyConfig) -> Self {
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

    pub fn config(&self) -> &MeshyConfig {
        &self.config
    }

    fn task_url(&self, id: &str) -> String {
        format!("{}/{}", self.config.endpoint, id)
    }
}

fn map_status(status: &str) -> JobStatus {
    match status {
        "SUCCEEDED" => JobStatus::Succeeded,
        "FAILED" => JobStatus::Failed,
        "CANCELED" | "EXPIRED" => JobStatus::Canceled,
        "PENDING" => JobStatus::Pending,
        _ => JobStatus::Processing,
    }
}

/// Read a task object into an updated copy of `job`.
fn parse_task(job: &GenerationJob, json: &Value) -> GenerationJob {
    let status = json
        .get("status")
        .and_then(|v| v.as_str())
        .map(map_status)
        .unwrap_or(JobStatus::Processing);

    let result_url = json
        .get("model_url")
        .and_then(|v| v.as_str())
        .or_else(|| json.pointer("/model_urls/glb").and_then(|v| v.as_str()))
        .filter(|url| !url.is_empty())
        .map(str::to_string);

    let error_message = json
        .pointer("/task_error/message")
        .and_then(|v| v.as_str())
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    GenerationJob {
        id: job.id.clone(),
        poll_url: job.poll_url.clone(),
        status,
        result_url,
        error_message,
        progress: json.get("progress").and_then(|v| v.as_u64()).map(|p| p as u32),
    }
}

impl BackendAdapter for MeshyAdapter {
    fn backend(&self) -> Backend {
        Backend::Meshy
    }

    fn encoding(&self) -> ImageEncoding {
        self.config.upload
    }

    fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    async fn submit(&self, image: &EncodedImage) -> Result<GenerationJob> {
        info!(endpoint = %self.config.endpoint, file = %image.file_name, "Creating Meshy task");
        let request = self
            .http
            .post(&self.config.endpoint)
            .timeout(self.config.timeout);
        let request = match self.config.upload {
            ImageEncoding::DataUri => request.json(&json!({ "image_url": image.data_uri() })),
            ImageEncoding::Multipart => {
                request.multipart(Form::new().part("image_file", image.multipart_part()?))
            }
        };

        let resp = self
            .config
            .auth
            .apply(request)
            .send()
            .await
            .map_err(|e| GenerationError::Network {
                context: format!("Cannot reach Meshy at {}", self.config.endpoint),
                source: e,
            })?;

        let (status, json) = read_submission(resp).await?;
        let id = json
            .get("result")
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| missing_field(status, &json, "result"))?;

        debug!(task = id, "Meshy task created");
        Ok(GenerationJob::pending(Some(id.to_string()), Some(self.task_url(id))))
    }

    async fn poll(&self, job: &GenerationJob) -> Result<GenerationJob> {
        let url = match (&job.poll_url, &job.id) {
            (Some(url), _) => url.clone(),
            (None, Some(id)) => self.task_url(id),
            (None, None) => return Err(GenerationError::Poll("Meshy job has no task id".into())),
        };

        let request = self.http.get(&url).timeout(self.config.timeout);
        let resp = self
            .config
            .auth
            .apply(request)
            .send()
            .await
            .map_err(|e| GenerationError::Poll(format!("Cannot reach {}: {}", url, e)))?;

        let json = read_poll(resp).await?;
        Ok(parse_task(job, &json))
    }
}
