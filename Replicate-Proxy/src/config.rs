use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::{ProxyError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.replicate.com/v1";

/// Relay settings. The credential comes from the environment only.
#[derive(Clone)]
pub struct ProxyConfig {
    /// Replicate key attached as `Authorization: Token <key>`. The server
    /// starts without it; requests then fail with a 500.
    pub api_key: Option<String>,
    pub api_base: String,
    /// Route name, served at `/api/<name>`.
    pub name: String,
    pub port: u16,
    /// Upstream request timeout.
    pub timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            name: "replicate-proxy".to_string(),
            port: 8888,
            timeout: Duration::from_secs(60),
        }
    }
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("name", &self.name)
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ProxyConfig {
    /// Read `REPLICATE_API_KEY`, `REPLICATE_API_BASE`, `PROXY_NAME` and `PORT`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.api_key = env::var("REPLICATE_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        if let Ok(base) = env::var("REPLICATE_API_BASE") {
            config = config.with_api_base(base);
        }
        if let Ok(name) = env::var("PROXY_NAME") {
            config = config.with_name(name);
        }
        if let Ok(port) = env::var("PORT") {
            config.port = port.trim().parse().map_err(|_| {
                ProxyError::Configuration(format!("PORT must be a number, got '{}'", port))
            })?;
        }
        Ok(config)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into().trim_matches('/').to_string();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Path the relay listens on.
    pub fn route(&self) -> String {
        format!("/api/{}", self.name)
    }
}
