use std::env;
use std::time::Duration;

use crate::error::{GenerationError, Result};
use crate::types::Backend;

/// Bounds on how long a single job may be polled.
///
/// Exceeding either bound ends the job with
/// [`GenerationError::Timeout`](crate::GenerationError::Timeout).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Maximum status checks per job (`None` = unlimited).
    pub max_attempts: Option<u32>,

    /// Wall-clock limit measured from submission (`None` = unlimited).
    pub deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(200),
            deadline: Some(Duration::from_secs(15 * 60)),
        }
    }
}

impl PollPolicy {
    /// No ceiling at all. Polling stops only on a terminal status,
    /// an error or cancellation.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            deadline: None,
        }
    }

    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = Some(max);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Top-level client configuration: which backend, and how long to wait.
///
/// Use [`GeneratorConfig::builder()`] for ergonomic construction, or
/// [`GeneratorConfig::from_env()`] to read `IMAGE3D_*` variables.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub backend: Backend,
    pub poll_policy: PollPolicy,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Meshy,
            poll_policy: PollPolicy::default(),
        }
    }
}

impl GeneratorConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder::default()
    }

    /// Read `IMAGE3D_BACKEND`, `IMAGE3D_MAX_POLLS` and `IMAGE3D_TIMEOUT_SECS`.
    ///
    /// Unset variables keep their defaults; malformed values are errors.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(backend) = env::var("IMAGE3D_BACKEND") {
            config.backend = backend.parse()?;
        }
        if let Ok(max) = env::var("IMAGE3D_MAX_POLLS") {
            let max = max.trim().parse::<u32>().map_err(|_| {
                GenerationError::Configuration(format!("IMAGE3D_MAX_POLLS must be a number, got '{}'", max))
            })?;
            config.poll_policy.max_attempts = Some(max);
        }
        if let Ok(secs) = env::var("IMAGE3D_TIMEOUT_SECS") {
            let secs = secs.trim().parse::<u64>().map_err(|_| {
                GenerationError::Configuration(format!(
                    "IMAGE3D_TIMEOUT_SECS must be a number, got '{}'",
                    secs
                ))
            })?;
            config.poll_policy.deadline = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }
}

/// Builder for [`GeneratorConfig`].
#[derive(Default)]
pub struct GeneratorConfigBuilder {
    config: GeneratorConfig,
}

impl GeneratorConfigBuilder {
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.config.poll_policy = policy;
        self
    }

    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.config.poll_policy.max_attempts = Some(max);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.config.poll_policy.deadline = Some(deadline);
        self
    }

    /// Build the final [`GeneratorConfig`].
    pub fn build(self) -> GeneratorConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_bounded() {
        let policy = PollPolicy::default();
        assert_eq!(policy.max_attempts, Some(200));
        assert_eq!(policy.deadline, Some(Duration::from_secs(900)));
    }

    #[test]
    fn test_builder() {
        let config = GeneratorConfig::builder()
            .with_backend(Backend::Replicate)
            .with_max_attempts(10)
            .with_deadline(Duration::from_secs(60))
            .build();
        assert_eq!(config.backend, Backend::Replicate);
        assert_eq!(config.poll_policy.max_attempts, Some(10));
        assert_eq!(config.poll_policy.deadline, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_unbounded_policy() {
        let policy = PollPolicy::unbounded().with_max_attempts(3);
        assert_eq!(policy.max_attempts, Some(3));
        assert_eq!(policy.deadline, None);
    }
}
