use std::net::SocketAddr;

use replicate_proxy::{app, ProxyConfig};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = ProxyConfig::from_env()?;
    if config.api_key.is_none() {
        warn!("REPLICATE_API_KEY is not set; every relayed request will fail");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Relaying {} on {} to {}", config.route(), addr, config.api_base);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app(config)).await?;
    Ok(())
}
