//! Pool configuration.

use crate::error::PoolError;
use crate::instrumentation::SanitizationConfig;

/// Default connection cap.
pub const DEFAULT_MAX_CONNECTIONS: u16 = 2;

/// Configuration for a [`Pool`](crate::Pool).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Maximum number of live connections across all targets.
    pub max_connections: u16,

    /// How SQL text is rendered in log output.
    pub sanitization: SanitizationConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            sanitization: SanitizationConfig::default(),
        }
    }
}

impl PoolConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection cap.
    #[must_use]
    pub fn max_connections(mut self, count: u16) -> Self {
        self.max_connections = count;
        self
    }

    /// Set how SQL text is rendered in logs.
    #[must_use]
    pub fn sanitization(mut self, sanitization: SanitizationConfig) -> Self {
        self.sanitization = sanitization;
        self
    }

    /// Check the configuration for values the pool cannot run with.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_connections == 0 {
            return Err(PoolError::Config(
                "max_connections must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
