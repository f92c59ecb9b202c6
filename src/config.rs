//! Service-level configuration.
//!
//! [`ServiceConfig`] groups what the service needs to come up: the storage
//! pool, the analysis engine endpoint and the settle policy. The HTTP server
//! builds one from its flat environment configuration; library users can
//! build one directly.
//!
//! ```rust
//! use analysis::ServiceConfig;
//!
//! let mut cfg = ServiceConfig::default();
//! assert!(cfg.validate().is_err()); // engine URL is required
//!
//! cfg.upstream.url = "http://engine:5000/analyze".into();
//! cfg.validate().unwrap();
//! ```

use ingest::{ConfigError, SettlePolicy, UpstreamConfig};
use serde::{Deserialize, Serialize};
use store::PoolConfig;
use thiserror::Error;

/// Everything needed to construct an [`AnalysisService`](crate::AnalysisService).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub pool: PoolConfig,
    pub upstream: UpstreamConfig,
    pub settle: SettlePolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            upstream: UpstreamConfig::new(""),
            settle: SettlePolicy::default(),
        }
    }
}

/// Errors raised while validating a [`ServiceConfig`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceConfigError {
    #[error(transparent)]
    Ingest(#[from] ConfigError),

    #[error("database max connections must be greater than zero")]
    ZeroMaxConnections,

    #[error("database min connections ({min}) exceeds max connections ({max})")]
    MinExceedsMax { min: u32, max: u32 },
}

impl ServiceConfig {
    /// Reject configurations the service cannot start with.
    pub fn validate(&self) -> Result<(), ServiceConfigError> {
        self.upstream.validate()?;
        self.settle.validate()?;

        if self.pool.max_connections == 0 {
            return Err(ServiceConfigError::ZeroMaxConnections);
        }
        if self.pool.min_connections > self.pool.max_connections {
            return Err(ServiceConfigError::MinExceedsMax {
                min: self.pool.min_connections,
                max: self.pool.max_connections,
            });
        }
        Ok(())
    }
}
