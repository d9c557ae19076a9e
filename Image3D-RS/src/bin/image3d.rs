//! image3d CLI - turn a single image into a GLB model

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use image3d_rs::{
    AnyAdapter, Backend, GenerationClient, GeneratorConfig, ImageFile, ModelViewer,
};
use tracing::{info, warn};

/// Generate a 3D model from an image with a hosted image-to-3D backend
#[derive(Parser)]
#[command(name = "image3d")]
#[command(about = "Generate a 3D model (GLB) from a single image", long_about = None)]
struct Cli {
    /// Source image (png, jpg, webp)
    image: PathBuf,

    /// Backend to use (gradio, replicate, meshy); overrides IMAGE3D_BACKEND
    #[arg(long)]
    backend: Option<Backend>,

    /// Where to write the downloaded model
    #[arg(long, short, default_value = "model.glb")]
    output: PathBuf,

    /// Maximum status checks before giving up
    #[arg(long)]
    max_polls: Option<u32>,

    /// Wall-clock limit for polling, in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let mut config = GeneratorConfig::from_env()?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(max) = cli.max_polls {
        config.poll_policy.max_attempts = Some(max);
    }
    if let Some(secs) = cli.timeout_secs {
        config.poll_policy.deadline = Some(Duration::from_secs(secs));
    }

    let adapter = AnyAdapter::from_env(config.backend)?;
    info!(backend = %config.backend, policy = ?config.poll_policy, "Starting generation");

    let client = Arc::new(
        GenerationClient::new(adapter, ModelViewer::new()).with_poll_policy(config.poll_policy),
    );

    let mut status = client.subscribe();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = status.borrow_and_update().clone();
            println!("[{:?}] {}", current.state, current.message);
        }
    });

    let request = client.request(Some(ImageFile::path(cli.image)));
    tokio::pin!(request);
    let result = tokio::select! {
        result = &mut request => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling generation");
            client.cancel();
            request.await
        }
    };

    match result {
        Ok(url) => {
            client.viewer().await.save(&cli.output).await?;
            println!("Saved {} -> {}", url, cli.output.display());
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", client.status().message);
            Err(e.into())
        }
    }
}
