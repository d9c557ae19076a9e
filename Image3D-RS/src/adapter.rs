use std::fmt;
use std::future::Future;
use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use serde_json::Value;

use crate::encoder::{EncodedImage, ImageEncoding};
use crate::error::{GenerationError, Result};
use crate::gradio::{GradioAdapter, GradioConfig};
use crate::meshy::{MeshyAdapter, MeshyConfig};
use crate::replicate::{ReplicateAdapter, ReplicateConfig};
use crate::types::{Backend, GenerationJob, JobStatus};

/// Vendor-specific half of the generation lifecycle.
///
/// An adapter knows how to build the creation request, which credential
/// header to attach, how to read the vendor's job schema and when a job is
/// finished. The [`GenerationClient`](crate::GenerationClient) drives it.
///
/// # Example
///
/// ```ignore
/// use image3d_rs::*;
///
/// struct FixedAdapter;
///
/// impl BackendAdapter for FixedAdapter {
///     fn backend(&self) -> Backend { Backend::Gradio }
///     fn encoding(&self) -> ImageEncoding { ImageEncoding::DataUri }
///     fn poll_interval(&self) -> std::time::Duration { std::time::Duration::from_secs(3) }
///
///     async fn submit(&self, _image: &EncodedImage) -> Result<GenerationJob> {
///         Ok(GenerationJob::succeeded(Some("https://cdn/model.glb".into())))
///     }
///
///     async fn poll(&self, job: &GenerationJob) -> Result<GenerationJob> {
///         Ok(job.clone())
///     }
/// }
/// ```
pub trait BackendAdapter: Send + Sync {
    fn backend(&self) -> Backend;

    /// The image encoding the creation request carries.
    fn encoding(&self) -> ImageEncoding;

    /// Fixed delay between status checks.
    fn poll_interval(&self) -> Duration;

    /// Issue the creation request and parse the initial job.
    ///
    /// Synchronous backends return a job that is already terminal.
    fn submit(
        &self,
        image: &EncodedImage,
    ) -> impl Future<Output = Result<GenerationJob>> + Send;

    /// Issue one status check and return the updated job.
    ///
    /// A well-formed "still processing" answer is `Ok`; only transport
    /// failures and unreadable bodies are errors.
    fn poll(&self, job: &GenerationJob) -> impl Future<Output = Result<GenerationJob>> + Send;

    fn is_terminal(&self, job: &GenerationJob) -> bool {
        job.status.is_terminal()
    }

    /// The asset URL of a succeeded job.
    fn extract_result(&self, job: &GenerationJob) -> Result<String> {
        if job.status != JobStatus::Succeeded {
            return Err(GenerationError::MissingResult(format!(
                "job {} is {}, not succeeded",
                job.label(),
                job.status
            )));
        }
        job.result_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                GenerationError::MissingResult(format!("job {} has no model URL", job.label()))
            })
    }
}

/// How a request is authenticated.
#[derive(Clone, Default)]
pub enum AuthScheme {
    /// No credential; used for public demos and proxied calls.
    #[default]
    None,
    /// `Authorization: Token <key>`
    Token(String),
    /// `Authorization: Bearer <key>`
    Bearer(String),
}

impl AuthScheme {
    /// Attach the credential header, if any, to `request`.
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            AuthScheme::None => request,
            AuthScheme::Token(key) => request.header("Authorization", format!("Token {}", key)),
            AuthScheme::Bearer(key) => request.bearer_auth(key),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, AuthScheme::None)
    }
}

impl fmt::Debug for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthScheme::None => f.write_str("None"),
            AuthScheme::Token(_) => f.write_str("Token(<redacted>)"),
            AuthScheme::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

pub(crate) fn normalize(endpoint: String) -> String {
    endpoint.trim_end_matches('/').to_string()
}

/// Read a creation response: non-success status or unparseable JSON is a
/// submission error carrying the raw body.
pub(crate) async fn read_submission(resp: Response) -> Result<(u16, Value)> {
    let status = resp.status().as_u16();
    let success = resp.status().is_success();
    let body = resp.text().await.map_err(|e| GenerationError::Network {
        context: "Failed to read submission response".into(),
        source: e,
    })?;

    if !success {
        return Err(GenerationError::Submission { status, body });
    }

    match serde_json::from_str(&body) {
        Ok(json) => Ok((status, json)),
        Err(_) => Err(GenerationError::Submission { status, body }),
    }
}

/// Read a status response: anything but a success status with a JSON body
/// is a poll error.
pub(crate) async fn read_poll(resp: Response) -> Result<Value> {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| GenerationError::Poll(format!("Failed to read status response: {}", e)))?;

    if !status.is_success() {
        return Err(GenerationError::Poll(format!("HTTP {}: {}", status.as_u16(), body)));
    }

    serde_json::from_str(&body)
        .map_err(|e| GenerationError::Poll(format!("Unparseable status body ({}): {}", e, body)))
}

/// A submission body that lacks the field identifying the job.
pub(crate) fn missing_field(status: u16, body: &Value, field: &str) -> GenerationError {
    GenerationError::Submission {
        status,
        body: format!("Response missing {}: {}", field, body),
    }
}

/// Adapter chosen at runtime from configuration.
#[derive(Debug, Clone)]
pub enum AnyAdapter {
    Gradio(GradioAdapter),
    Replicate(ReplicateAdapter),
    Meshy(MeshyAdapter),
}

impl AnyAdapter {
    /// Build the adapter for `backend` from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Configuration`] if a required endpoint,
    /// credential or model version is missing.
    pub fn from_env(backend: Backend) -> Result<Self> {
        Ok(match backend {
            Backend::Gradio => AnyAdapter::Gradio(GradioAdapter::new(GradioConfig::from_env()?)),
            Backend::Replicate => {
                AnyAdapter::Replicate(ReplicateAdapter::new(ReplicateConfig::from_env()?))
            }
            Backend::Meshy => AnyAdapter::Meshy(MeshyAdapter::new(MeshyConfig::from_env()?)),
        })
    }
}

impl From<GradioAdapter> for AnyAdapter {
    fn from(adapter: GradioAdapter) -> Self {
        AnyAdapter::Gradio(adapter)
    }
}

impl From<ReplicateAdapter> for AnyAdapter {
    fn from(adapter: ReplicateAdapter) -> Self {
        AnyAdapter::Replicate(adapter)
    }
}

impl From<MeshyAdapter> for AnyAdapter {
    fn from(adapter: MeshyAdapter) -> Self {
        AnyAdapter::Meshy(adapter)
    }
}

impl BackendAdapter for AnyAdapter {
    fn backend(&self) -> Backend {
        match self {
            AnyAdapter::Gradio(a) => a.backend(),
            AnyAdapter::Replicate(a) => a.backend(),
            AnyAdapter::Meshy(a) => a.backend(),
        }
    }

    fn encoding(&self) -> ImageEncoding {
        match self {
            AnyAdapter::Gradio(a) => a.encoding(),
            AnyAdapter::Replicate(a) => a.encoding(),
            AnyAdapter::Meshy(a) => a.encoding(),
        }
    }

    fn poll_interval(&self) -> Duration {
        match self {
            AnyAdapter::Gradio(a) => a.poll_interval(),
            AnyAdapter::Replicate(a) => a.poll_interval(),
            AnyAdapter::Meshy(a) => a.poll_interval(),
        }
    }

    async fn submit(&self, image: &EncodedImage) -> Result<GenerationJob> {
        match self {
            AnyAdapter::Gradio(a) => a.submit(image).await,
            AnyAdapter::Replicate(a) => a.submit(image).await,
            AnyAdapter::Meshy(a) => a.submit(image).await,
        }
    }

    async fn poll(&self, job: &GenerationJob) -> Result<GenerationJob> {
        match self {
            AnyAdapter::Gradio(a) => a.poll(job).await,
            AnyAdapter::Replicate(a) => a.poll(job).await,
            AnyAdapter::Meshy(a) => a.poll(job).await,
        }
    }

    fn extract_result(&self, job: &GenerationJob) -> Result<String> {
        match self {
            AnyAdapter::Gradio(a) => a.extract_result(job),
            AnyAdapter::Replicate(a) => a.extract_result(job),
            AnyAdapter::Meshy(a) => a.extract_result(job),
        }
    }
}
