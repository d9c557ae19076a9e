use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::encoder::EncodedImage;
use crate::error::GenerationError;

/// The image-to-3D services a client can be pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Public Gradio demo; answers synchronously.
    Gradio,
    /// Replicate predictions API; returns a poll URL.
    Replicate,
    /// Meshy image-to-3d API; polled by task id.
    Meshy,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Gradio => "gradio",
            Backend::Replicate => "replicate",
            Backend::Meshy => "meshy",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backend::Gradio => "Gradio",
            Backend::Replicate => "Replicate",
            Backend::Meshy => "Meshy",
        };
        f.write_str(name)
    }
}

impl FromStr for Backend {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gradio" => Ok(Backend::Gradio),
            "replicate" => Ok(Backend::Replicate),
            "meshy" => Ok(Backend::Meshy),
            other => Err(GenerationError::Configuration(format!(
                "Unknown backend '{}' (expected gradio, replicate or meshy)",
                other
            ))),
        }
    }
}

/// Job status lifecycle: Pending -> Processing -> Succeeded/Failed/Canceled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A vendor-tracked generation task.
///
/// Only the polling loop replaces a job; once `status` is terminal the job
/// is never revisited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationJob {
    /// Vendor job id. Absent for synchronous backends.
    pub id: Option<String>,
    /// URL to poll directly, when the vendor hands one out.
    pub poll_url: Option<String>,
    pub status: JobStatus,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
    /// Vendor-reported completion percentage, if any.
    pub progress: Option<u32>,
}

impl GenerationJob {
    /// A freshly created job awaiting its first status check.
    pub fn pending(id: Option<String>, poll_url: Option<String>) -> Self {
        Self {
            id,
            poll_url,
            status: JobStatus::Pending,
            result_url: None,
            error_message: None,
            progress: None,
        }
    }

    /// A job that finished inside the submission call.
    pub fn succeeded(result_url: Option<String>) -> Self {
        Self {
            id: None,
            poll_url: None,
            status: JobStatus::Succeeded,
            result_url,
            error_message: None,
            progress: Some(100),
        }
    }

    /// A job the vendor rejected inside the submission call.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            id: None,
            poll_url: None,
            status: JobStatus::Failed,
            result_url: None,
            error_message: Some(message.into()),
            progress: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Human-readable label for logs: the id, the poll URL, or "sync".
    pub fn label(&self) -> &str {
        self.id
            .as_deref()
            .or(self.poll_url.as_deref())
            .unwrap_or("sync")
    }
}

/// An image ready to be sent to a backend.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub image: EncodedImage,
    pub backend: Backend,
    pub created_at: DateTime<Utc>,
}

impl GenerationRequest {
    pub fn new(image: EncodedImage, backend: Backend) -> Self {
        Self {
            image,
            backend,
            created_at: Utc::now(),
        }
    }
}

/// States of the generation client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientState {
    Idle,
    Encoding,
    Submitting,
    Polling,
    Succeeded,
    Failed,
}

impl ClientState {
    /// Stage name used when describing a failure.
    pub fn stage(&self) -> &'static str {
        match self {
            ClientState::Idle => "idle",
            ClientState::Encoding => "image encoding",
            ClientState::Submitting => "submission",
            ClientState::Polling => "status polling",
            ClientState::Succeeded => "model loading",
            ClientState::Failed => "failure handling",
        }
    }
}

/// The single user-visible status line, plus the state it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientStatus {
    pub state: ClientState,
    pub message: String,
}

impl Default for ClientStatus {
    fn default() -> Self {
        Self {
            state: ClientState::Idle,
            message: "Select an image to generate a 3D model.".to_string(),
        }
    }
}
