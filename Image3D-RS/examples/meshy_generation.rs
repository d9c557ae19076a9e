//! Generate a model with Meshy and save it next to the source image.
//!
//! Requires `MESHY_API_KEY` in the environment (or a `.env` file).
//!
//! ```sh
//! cargo run --example meshy_generation -- chair.png
//! ```

use image3d_rs::{
    GenerationClient, ImageEncoding, ImageFile, MeshyAdapter, MeshyConfig, ModelViewer, PollPolicy,
};
use std::time::Duration;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: meshy_generation <image>");
        return Ok(());
    };

    let config = MeshyConfig::from_env()?.with_upload(ImageEncoding::Multipart);
    let client = GenerationClient::new(MeshyAdapter::new(config), ModelViewer::new())
        .with_poll_policy(PollPolicy::default().with_deadline(Duration::from_secs(600)));

    let mut status = client.subscribe();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            println!("{}", status.borrow().message);
        }
    });

    match client.request(Some(ImageFile::path(&path))).await {
        Ok(url) => {
            let output = std::path::Path::new(&path).with_extension("glb");
            client.viewer().await.save(&output).await?;
            println!("Saved {} -> {}", url, output.display());
        }
        Err(e) => eprintln!("Generation failed [{}]: {}", e.kind(), e),
    }

    Ok(())
}
