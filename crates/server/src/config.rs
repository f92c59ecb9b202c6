use analysis::{PoolConfig, ServiceConfig, SettlePolicy, UpstreamConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{ServerError, ServerResult};

/// Server configuration
///
/// Field names match the environment variables they are read from
/// (`PORT`, `DB_HOST`, `ANALYSIS_API_URL`, ...), so a deployment configured
/// through plain environment variables needs no prefix or nesting.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds. Must cover the upstream deadline plus the
    /// settle window, or uploads time out before the engine answers.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum upload size in MB
    #[serde(default = "default_max_body_size_mb")]
    pub max_body_size_mb: usize,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Allowed CORS origins
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Log level or `tracing` filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones
    #[serde(default = "default_true")]
    pub log_json: bool,

    /// Metrics endpoint enabled
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    #[serde(default = "default_db_host")]
    pub db_host: String,
    #[serde(default = "default_db_port")]
    pub db_port: u16,
    #[serde(default = "default_db_user")]
    pub db_user: String,
    #[serde(default = "default_db_password")]
    pub db_password: String,
    #[serde(default = "default_db_name")]
    pub db_name: String,
    #[serde(default = "default_db_max_conns")]
    pub db_max_conns: u32,
    #[serde(default = "default_db_min_conns")]
    pub db_min_conns: u32,
    /// Seconds
    #[serde(default = "default_db_max_conn_lifetime")]
    pub db_max_conn_lifetime: u64,
    /// Seconds
    #[serde(default = "default_db_max_conn_idle_time")]
    pub db_max_conn_idle_time: u64,

    /// Analysis engine upload URL. Required.
    #[serde(default)]
    pub analysis_api_url: String,

    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,

    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_settle_attempts")]
    pub settle_attempts: u32,
    #[serde(default = "default_settle_backoff_ms")]
    pub settle_backoff_ms: u64,
    #[serde(default = "default_settle_max_backoff_ms")]
    pub settle_max_backoff_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            max_body_size_mb: default_max_body_size_mb(),
            enable_cors: default_true(),
            cors_origins: default_cors_origins(),
            log_level: default_log_level(),
            log_json: default_true(),
            metrics_enabled: default_true(),
            db_host: default_db_host(),
            db_port: default_db_port(),
            db_user: default_db_user(),
            db_password: default_db_password(),
            db_name: default_db_name(),
            db_max_conns: default_db_max_conns(),
            db_min_conns: default_db_min_conns(),
            db_max_conn_lifetime: default_db_max_conn_lifetime(),
            db_max_conn_idle_time: default_db_max_conn_idle_time(),
            analysis_api_url: String::new(),
            upstream_timeout_secs: default_upstream_timeout_secs(),
            settle_delay_ms: default_settle_delay_ms(),
            settle_attempts: default_settle_attempts(),
            settle_backoff_ms: default_settle_backoff_ms(),
            settle_max_backoff_ms: default_settle_max_backoff_ms(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from an optional `.env`, an optional
    /// `analysis-server.{toml,yaml,json}` file and the environment.
    pub fn load() -> anyhow::Result<Self> {
        // A missing .env is normal outside local development.
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .add_source(config::File::with_name("analysis-server").required(false))
            .add_source(
                config::Environment::default()
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors_origins"),
            );

        let config: ServerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the server cannot start with.
    pub fn validate(&self) -> ServerResult<()> {
        self.service_config()
            .validate()
            .map_err(|e| ServerError::Config(e.to_string()))?;
        if self.max_body_size_mb == 0 {
            return Err(ServerError::Config(
                "MAX_BODY_SIZE_MB must be greater than zero".into(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ServerError::Config(
                "TIMEOUT_SECS must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// The service-level view: pool, engine endpoint and settle policy.
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            pool: PoolConfig {
                host: self.db_host.clone(),
                port: self.db_port,
                user: self.db_user.clone(),
                password: self.db_password.clone(),
                database: self.db_name.clone(),
                max_connections: self.db_max_conns,
                min_connections: self.db_min_conns,
                max_lifetime_secs: self.db_max_conn_lifetime,
                idle_timeout_secs: self.db_max_conn_idle_time,
                ..PoolConfig::default()
            },
            upstream: UpstreamConfig {
                url: self.analysis_api_url.clone(),
                timeout_secs: self.upstream_timeout_secs,
            },
            settle: SettlePolicy {
                initial_delay_ms: self.settle_delay_ms,
                attempts: self.settle_attempts,
                backoff_ms: self.settle_backoff_ms,
                max_backoff_ms: self.settle_max_backoff_ms,
            },
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.bind_addr, self.port);
        Ok(addr_str.parse()?)
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get max body size in bytes
    pub fn max_body_size(&self) -> usize {
        self.max_body_size_mb * 1024 * 1024
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout_secs() -> u64 {
    180
}

fn default_max_body_size_mb() -> usize {
    50
}

fn default_true() -> bool {
    true
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:8081".to_string(),
    ]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_user() -> String {
    "user".to_string()
}

fn default_db_password() -> String {
    "password".to_string()
}

fn default_db_name() -> String {
    "db".to_string()
}

fn default_db_max_conns() -> u32 {
    10
}

fn default_db_min_conns() -> u32 {
    2
}

fn default_db_max_conn_lifetime() -> u64 {
    3600
}

fn default_db_max_conn_idle_time() -> u64 {
    300
}

fn default_upstream_timeout_secs() -> u64 {
    120
}

fn default_settle_delay_ms() -> u64 {
    3000
}

fn default_settle_attempts() -> u32 {
    5
}

fn default_settle_backoff_ms() -> u64 {
    500
}

fn default_settle_max_backoff_ms() -> u64 {
    4000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.timeout_secs, 180);
        assert_eq!(cfg.max_body_size_mb, 50);
        assert_eq!(cfg.db_max_conns, 10);
        assert_eq!(cfg.db_min_conns, 2);
        assert!(cfg.enable_cors);
        assert!(cfg.metrics_enabled);
        assert_eq!(cfg.cors_origins.len(), 3);
    }

    #[test]
    fn test_engine_url_is_required() {
        let mut cfg = ServerConfig::default();
        assert!(matches!(cfg.validate(), Err(ServerError::Config(_))));

        cfg.analysis_api_url = "http://engine:5000/analyze".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_service_config_mapping() {
        let cfg = ServerConfig {
            db_host: "db.internal".into(),
            db_max_conn_idle_time: 60,
            analysis_api_url: "http://engine/analyze".into(),
            settle_attempts: 3,
            ..Default::default()
        };
        let service = cfg.service_config();
        assert_eq!(service.pool.host, "db.internal");
        assert_eq!(service.pool.idle_timeout_secs, 60);
        assert_eq!(service.upstream.timeout_secs, 120);
        assert_eq!(service.settle.attempts, 3);
        assert_eq!(service.settle.initial_delay_ms, 3000);
    }

    #[test]
    fn test_flat_keys_deserialize() {
        let cfg: ServerConfig = serde_json::from_str(
            r#"{"port": 9000, "db_name": "analyses", "analysis_api_url": "http://engine"}"#,
        )
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.db_name, "analyses");
        assert_eq!(cfg.settle_backoff_ms, 500);
    }

    #[test]
    fn test_socket_addr() {
        let cfg = ServerConfig::default();
        let addr = cfg.socket_addr().unwrap();
        assert_eq!(addr.port(), 8080);
    }
}
