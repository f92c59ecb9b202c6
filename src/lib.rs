//! Workspace umbrella crate for the image-analysis service.
//!
//! This crate wires the storage query layer and the ingestion coordinator
//! into one [`AnalysisService`] so the HTTP server (and any other front end)
//! holds a single handle.

mod config;

pub use config::{ServiceConfig, ServiceConfigError};
pub use ingest::{
    HttpUpstreamClient, IngestError, Ingested, IngestionCoordinator, IngestionOutcome,
    SettlePolicy, UploadRequest, UpstreamClient, UpstreamConfig, UpstreamReply,
};
pub use store::{
    Analysis, AnalysisFilter, AnalysisQuery, AnalysisRepository, AnalysisRow, Catalog,
    InMemoryRepository, Measurements, Object, ObjectMetadata, Page, PaginationParams,
    PgRepository, PoolConfig, StoreError,
};

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

/// Errors that can occur while bringing the service up.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ServiceConfigError),

    #[error("storage: {0}")]
    Store(#[from] StoreError),

    #[error("upstream client: {0}")]
    Upstream(#[from] IngestError),
}

/// Query layer and ingestion coordinator sharing one repository.
#[derive(Clone)]
pub struct AnalysisService {
    catalog: Catalog,
    coordinator: IngestionCoordinator,
}

impl AnalysisService {
    /// Assemble a service from already-built parts.
    pub fn new(
        repo: Arc<dyn AnalysisRepository>,
        upstream: Arc<dyn UpstreamClient>,
        settle: SettlePolicy,
    ) -> Self {
        let catalog = Catalog::new(repo);
        let coordinator = IngestionCoordinator::new(upstream, catalog.clone(), settle);
        Self {
            catalog,
            coordinator,
        }
    }

    /// Validate `cfg`, open the Postgres pool and build the HTTP upstream client.
    pub async fn connect(cfg: &ServiceConfig) -> Result<Self, ServiceError> {
        cfg.validate()?;

        let repo = PgRepository::connect(&cfg.pool).await?;
        let upstream = HttpUpstreamClient::new(&cfg.upstream)?;
        info!(
            upstream = %upstream.url(),
            settle_worst_case_ms = cfg.settle.worst_case().as_millis() as u64,
            "analysis service ready"
        );

        Ok(Self::new(Arc::new(repo), Arc::new(upstream), cfg.settle))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn coordinator(&self) -> &IngestionCoordinator {
        &self.coordinator
    }

    /// Close storage connections. Call after the last request has finished.
    pub async fn close(&self) {
        self.catalog.close().await;
    }
}
