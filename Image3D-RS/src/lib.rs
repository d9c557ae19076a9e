//! # image3d-rs
//!
//! Async Rust client that turns a single image into a 3D model through one
//! of several hosted image-to-3D services: a Gradio Space, a Replicate model
//! (direct or via a CORS proxy), or the Meshy task API.
//!
//! Each vendor sits behind a [`BackendAdapter`]. The [`GenerationClient`]
//! drives a request through encoding, submission and bounded polling, then
//! hands the resulting asset URL to a [`Viewer`]. A new request supersedes
//! the active one, and every failure surfaces as one [`GenerationError`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use image3d_rs::{AnyAdapter, GenerationClient, GeneratorConfig, ImageFile, ModelViewer};
//!
//! # async fn example() -> image3d_rs::Result<()> {
//! let config = GeneratorConfig::from_env()?;
//! let adapter = AnyAdapter::from_env(config.backend)?;
//! let client = GenerationClient::new(adapter, ModelViewer::new())
//!     .with_poll_policy(config.poll_policy);
//!
//! // Watch progress
//! let mut status = client.subscribe();
//! tokio::spawn(async move {
//!     while status.changed().await.is_ok() {
//!         println!("{}", status.borrow().message);
//!     }
//! });
//!
//! let url = client.request(Some(ImageFile::path("chair.png"))).await?;
//! println!("Loaded {}", url);
//! client.viewer().await.save(std::path::Path::new("chair.glb")).await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod client;
pub mod config;
pub mod encoder;
pub mod error;
pub mod gradio;
pub mod meshy;
pub mod replicate;
pub mod types;
pub mod viewer;

pub use adapter::{AnyAdapter, AuthScheme, BackendAdapter};
pub use client::GenerationClient;
pub use config::{GeneratorConfig, GeneratorConfigBuilder, PollPolicy};
pub use encoder::{encode, encode_bytes, EncodedImage, ImageEncoding, ImageFile, ImagePayload};
pub use error::{GenerationError, Result};
pub use gradio::{GradioAdapter, GradioConfig};
pub use meshy::{MeshyAdapter, MeshyConfig};
pub use replicate::{ReplicateAdapter, ReplicateConfig, ReplicateRoute};
pub use types::{
    Backend, ClientState, ClientStatus, GenerationJob, GenerationRequest, JobStatus,
};
pub use viewer::{sniff_format, LoadedModel, ModelFormat, ModelViewer, Viewer};
