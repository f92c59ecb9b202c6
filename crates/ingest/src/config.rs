//! Configuration for the upstream client and the settle-and-fetch step.
//!
//! Both types are plain serde structs so they can be filled from the server's
//! layered configuration. Validate once at startup:
//!
//! ```rust
//! use ingest::{SettlePolicy, UpstreamConfig};
//!
//! let upstream = UpstreamConfig::new("http://engine:5000/analyze");
//! upstream.validate().expect("valid upstream config");
//!
//! let settle = SettlePolicy::default();
//! assert_eq!(settle.attempts, 5);
//! assert!(settle.worst_case().as_secs() < 15);
//! ```
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where and how to reach the analysis engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Full URL the multipart upload is POSTed to.
    pub url: String,
    /// Total deadline for one exchange, connection through body read.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

impl UpstreamConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::MissingUpstreamUrl);
        }
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(ConfigError::InvalidUpstreamUrl(self.url.clone()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// How long to wait for an accepted analysis to appear in storage.
///
/// The engine writes to storage asynchronously relative to its HTTP reply.
/// After `initial_delay_ms`, storage is polled up to `attempts` times; the
/// wait between polls starts at `backoff_ms` and doubles, capped at
/// `max_backoff_ms`. With the defaults the worst case is 3s + 0.5 + 1 + 2 + 4s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlePolicy {
    pub initial_delay_ms: u64,
    pub attempts: u32,
    pub backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 3000,
            attempts: 5,
            backoff_ms: 500,
            max_backoff_ms: 4000,
        }
    }
}

impl SettlePolicy {
    /// No waiting at all; a single immediate lookup. Useful in tests.
    pub fn immediate() -> Self {
        Self {
            initial_delay_ms: 0,
            attempts: 1,
            backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Wait before retry number `retry` (0-based, i.e. before the second poll).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
        let ms = self
            .backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }

    /// Longest total time spent waiting before giving up.
    pub fn worst_case(&self) -> Duration {
        let retries = self.attempts.saturating_sub(1);
        (0..retries).fold(self.initial_delay(), |acc, retry| acc + self.backoff(retry))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.attempts == 0 {
            return Err(ConfigError::ZeroSettleAttempts);
        }
        if self.backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::BackoffExceedsCap {
                backoff: self.backoff_ms,
                cap: self.max_backoff_ms,
            });
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("analysis engine URL is required")]
    MissingUpstreamUrl,

    #[error("analysis engine URL must be http(s): {0}")]
    InvalidUpstreamUrl(String),

    #[error("upstream timeout must be greater than zero")]
    ZeroTimeout,

    #[error("settle attempts must be at least 1")]
    ZeroSettleAttempts,

    #[error("settle backoff ({backoff} ms) exceeds its cap ({cap} ms)")]
    BackoffExceedsCap { backoff: u64, cap: u64 },
}
