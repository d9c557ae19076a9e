use reqwest::Client;

use crate::config::ProxyConfig;

/// Shared by every handler.
pub struct ProxyState {
    pub config: ProxyConfig,
    pub http: Client,
}

impl ProxyState {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }
}
