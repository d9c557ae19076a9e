use std::env;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::adapter::{missing_field, normalize, read_submission, BackendAdapter};
use crate::encoder::{EncodedImage, ImageEncoding};
use crate::error::{GenerationError, Result};
use crate::types::{Backend, GenerationJob, JobStatus};

/// Configuration for a Gradio `run/predict` endpoint.
#[derive(Debug, Clone)]
pub struct GradioConfig {
    /// Full predict URL, e.g. `https://<space>.hf.space/run/predict`.
    pub endpoint: String,

    /// Index of the Gradio function to call.
    pub fn_index: u32,

    /// Inputs sent after the image, in order.
    pub extra_inputs: Vec<Value>,

    /// Suffix the returned model URL must carry.
    pub required_extension: String,

    /// Timeout for the predict call. Generation happens inside it.
    pub timeout: Duration,

    /// Delay between polls, used only if a call ever comes back non-terminal.
    pub poll_interval: Duration,
}

impl GradioConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: normalize(endpoint.into()),
            fn_index: 0,
            // num_inference_steps, denoising_steps
            extra_inputs: vec![json!(0), json!(20)],
            required_extension: ".glb".to_string(),
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(3),
        }
    }

    /// Read `GRADIO_ENDPOINT` from the environment.
    pub fn from_env() -> Result<Self> {
        let endpoint = env::var("GRADIO_ENDPOINT").map_err(|_| {
            GenerationError::Configuration("GRADIO_ENDPOINT is not set".into())
        })?;
        Ok(Self::new(endpoint))
    }

    pub fn with_fn_index(mut self, index: u32) -> Self {
        self.fn_index = index;
        self
    }

    pub fn with_extra_inputs(mut self, inputs: Vec<Value>) -> Self {
        self.extra_inputs = inputs;
        self
    }

    pub fn with_required_extension(mut self, ext: impl Into<String>) -> Self {
        self.required_extension = ext.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Adapter for a Gradio demo that answers in the submission call itself.
#[derive(Debug, Clone)]
pub struct GradioAdapter {
    http: Client,
    config: GradioConfig,
}

impl GradioAdapter {
    pub fn new(config: GradioConfig) -> Self {
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

    pub fn config(&self) -> &GradioConfig {
        &self.config
    }

    fn request_body(&self, image: &EncodedImage) -> Value {
        let mut data = vec![Value::String(image.data_uri().into_owned())];
        data.extend(self.config.extra_inputs.iter().cloned());
        json!({
            "fn_index": self.config.fn_index,
            "data": data,
        })
    }
}

/// Turn a predict response into a terminal job.
fn parse_prediction(status: u16, json: &Value) -> Result<GenerationJob> {
    if let Some(error) = json.get("error").filter(|e| !e.is_null()) {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Ok(GenerationJob::failed(message));
    }

    let first = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| missing_field(status, json, "data"))?
        .first();

    // Newer Gradio versions wrap files as {"url": ..., "path": ...}.
    let url = first.and_then(|v| {
        v.as_str()
            .or_else(|| v.get("url").and_then(|u| u.as_str()))
            .map(str::to_string)
    });

    Ok(GenerationJob::succeeded(url))
}

impl BackendAdapter for GradioAdapter {
    fn backend(&self) -> Backend {
        Backend::Gradio
    }

    fn encoding(&self) -> ImageEncoding {
        ImageEncoding::DataUri
    }

    fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    async fn submit(&self, image: &EncodedImage) -> Result<GenerationJob> {
        info!(endpoint = %self.config.endpoint, file = %image.file_name, "Submitting image to Gradio");
        let resp = self
            .http
            .post(&self.config.endpoint)
            .timeout(self.config.timeout)
            .json(&self.request_body(image))
            .send()
            .await
            .map_err(|e| GenerationError::Network {
                context: format!("Cannot reach Gradio at {}", self.config.endpoint),
                source: e,
            })?;

        let (status, json) = read_submission(resp).await?;
        debug!(response = %json, "Gradio predict response");
        parse_prediction(status, &json)
    }

    /// Gradio answers synchronously, so there is nothing to check.
    async fn poll(&self, job: &GenerationJob) -> Result<GenerationJob> {
        Ok(job.clone())
    }

    fn extract_result(&self, job: &GenerationJob) -> Result<String> {
        if job.status != JobStatus::Succeeded {
            return Err(GenerationError::MissingResult(format!(
                "Gradio job is {}",
                job.status
            )));
        }
        match job.result_url.as_deref() {
            Some(url) if url.ends_with(&self.config.required_extension) => Ok(url.to_string()),
            Some(url) => Err(GenerationError::MissingResult(format!(
                "Could not find a valid {} model URL in the API response (got {})",
                self.config.required_extension, url
            ))),
            None => Err(GenerationError::MissingResult(format!(
                "Could not find a valid {} model URL in the API response",
                self.config.required_extension
            ))),
        }
    }
}
