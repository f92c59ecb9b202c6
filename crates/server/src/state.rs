use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use analysis::AnalysisService;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Catalog and ingestion coordinator (shared across requests)
    pub service: AnalysisService,

    /// Prometheus render handle, when metrics are enabled
    pub metrics: Option<PrometheusHandle>,

    pub started_at: Instant,
}

impl ServerState {
    /// Create state around an already-built service
    pub fn new(config: ServerConfig, service: AnalysisService) -> Self {
        Self {
            config: Arc::new(config),
            service,
            metrics: None,
            started_at: Instant::now(),
        }
    }

    /// Connect storage and build the upstream client from `config`
    pub async fn connect(config: ServerConfig) -> ServerResult<Self> {
        let service = AnalysisService::connect(&config.service_config())
            .await
            .map_err(|e| ServerError::Config(e.to_string()))?;
        Ok(Self::new(config, service))
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
