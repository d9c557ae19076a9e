use std::future::Future;
use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{GenerationError, Result};

/// Largest buffer reserved before the first chunk arrives.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

/// Boundary of whatever displays the generated asset.
///
/// The viewer holds at most one model. Rendering, camera and controls live
/// behind this trait and are not the client's concern.
pub trait Viewer: Send {
    /// Fetch and show the model at `url`, releasing any previous one first.
    ///
    /// `on_progress` receives the downloaded fraction in `0.0..=1.0`.
    fn load_model(
        &mut self,
        url: &str,
        on_progress: &mut (dyn FnMut(f32) + Send),
    ) -> impl Future<Output = Result<()>> + Send;

    /// Drop the current model, if any.
    fn clear_model(&mut self);

    fn on_resize(&mut self, width: u32, height: u32);
}

/// Container format of a loaded asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// Binary glTF (`.glb`).
    Glb,
    /// JSON glTF (`.gltf`).
    Gltf,
}

/// The asset currently held by a [`ModelViewer`].
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub url: String,
    pub format: ModelFormat,
    pub bytes: Vec<u8>,
}

/// Headless viewer: downloads the asset, checks it is glTF and keeps it.
#[derive(Debug)]
pub struct ModelViewer {
    http: Client,
    timeout: Duration,
    viewport: (u32, u32),
    current: Option<LoadedModel>,
}

impl Default for ModelViewer {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelViewer {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            timeout: Duration::from_secs(120),
            viewport: (800, 600),
            current: None,
        }
    }

    /// Use a custom `reqwest::Client` (for connection pooling, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn current(&self) -> Option<&LoadedModel> {
        self.current.as_ref()
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Write the current model to `path`.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let model = self
            .current
            .as_ref()
            .ok_or_else(|| GenerationError::ModelLoad("No model is loaded".into()))?;
        tokio::fs::write(path, &model.bytes)
            .await
            .map_err(|e| GenerationError::ModelLoad(format!("{}: {}", path.display(), e)))
    }
}

/// Identify a glTF asset by its header.
pub fn sniff_format(bytes: &[u8]) -> Option<ModelFormat> {
    if bytes.starts_with(b"glTF") {
        return Some(ModelFormat::Glb);
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(json) if json.get("asset").map(|a| a.is_object()).unwrap_or(false) => {
            Some(ModelFormat::Gltf)
        }
        _ => None,
    }
}

impl Viewer for ModelViewer {
    async fn load_model(
        &mut self,
        url: &str,
        on_progress: &mut (dyn FnMut(f32) + Send),
    ) -> Result<()> {
        self.clear_model();

        let mut resp = self
            .http
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| GenerationError::ModelLoad(format!("Cannot fetch {}: {}", url, e)))?;

        if !resp.status().is_success() {
            return Err(GenerationError::ModelLoad(format!(
                "HTTP {} fetching {}",
                resp.status().as_u16(),
                url
            )));
        }

        let total = resp.content_length();
        // Content-Length comes from the asset host and is not trusted.
        let reserve = total.unwrap_or(0).min(MAX_PREALLOC);
        let mut bytes = Vec::with_capacity(usize::try_from(reserve).unwrap_or(0));
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| GenerationError::ModelLoad(format!("Download interrupted: {}", e)))?
        {
            bytes.extend_from_slice(&chunk);
            if let Some(total) = total.filter(|t| *t > 0) {
                on_progress((bytes.len() as f64 / total as f64).min(1.0) as f32);
            }
        }

        let format = sniff_format(&bytes).ok_or_else(|| {
            GenerationError::ModelLoad(format!("{} is not a glTF asset", url))
        })?;
        on_progress(1.0);

        info!(url, size = bytes.len(), ?format, "Model loaded");
        self.current = Some(LoadedModel {
            url: url.to_string(),
            format,
            bytes,
        });
        Ok(())
    }

    fn clear_model(&mut self) {
        if let Some(model) = self.current.take() {
            debug!(url = %model.url, "Released model");
        }
    }

    fn on_resize(&mut self, width: u32, height: u32) {
        self.viewport = (width.max(1), height.max(1));
    }
}
