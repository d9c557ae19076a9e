use std::time::Duration;

use thiserror::Error;

use crate::types::JobStatus;

/// Errors returned by the generation lifecycle.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// `request` was called without an image.
    #[error("Please select an image file first.")]
    NoImageSelected,

    /// The selected image could not be read.
    #[error("Failed to read image: {0}")]
    Encoding(String),

    /// The creation request returned a non-success status or a body
    /// without the job-identifying field.
    #[error("Submission failed with HTTP {status}: {body}")]
    Submission { status: u16, body: String },

    /// A status check failed at the transport level or returned a body
    /// that could not be understood.
    #[error("Status check failed: {0}")]
    Poll(String),

    /// The job succeeded but carried no usable asset URL.
    #[error("No usable model URL: {0}")]
    MissingResult(String),

    /// The viewer could not fetch or parse the asset.
    #[error("Could not load the 3D model: {0}")]
    ModelLoad(String),

    /// Required configuration (endpoint, credential, model version) is absent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The job outlived its poll ceiling or deadline.
    #[error("Generation timed out after {attempts} status checks ({elapsed:?})")]
    Timeout { attempts: u32, elapsed: Duration },

    /// The vendor reported a terminal failure.
    #[error("Generation {status}: {detail}")]
    JobFailed { status: JobStatus, detail: String },

    /// The job was cancelled or superseded by a newer request.
    #[error("Generation was cancelled")]
    Cancelled,

    /// Network-level request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },
}

impl GenerationError {
    /// Taxonomy name used in status messages and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::NoImageSelected => "NoImageSelected",
            GenerationError::Encoding(_) => "EncodingError",
            GenerationError::Submission { .. } | GenerationError::Network { .. } => {
                "SubmissionError"
            }
            GenerationError::Poll(_) => "PollError",
            GenerationError::MissingResult(_) => "MissingResultError",
            GenerationError::ModelLoad(_) => "ModelLoadError",
            GenerationError::Configuration(_) => "ConfigurationError",
            GenerationError::Timeout { .. } => "TimeoutError",
            GenerationError::JobFailed { .. } => "GenerationFailed",
            GenerationError::Cancelled => "Cancelled",
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, GenerationError>;
