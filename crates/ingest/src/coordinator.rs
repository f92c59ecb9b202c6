use std::sync::Arc;
use std::time::Instant;

use store::{Analysis, Catalog};
use tracing::{debug, info, warn, Instrument};

use crate::client::UpstreamClient;
use crate::config::SettlePolicy;
use crate::reply::interpret;
use crate::types::{Ingested, IngestionOutcome, UploadRequest};
use crate::IngestError;

/// Drives one upload from validation to a record readable from storage.
///
/// Each call walks `Validating → Forwarding → Interpreting`, and on
/// acceptance settles and polls storage for the new record. Holds no
/// per-request state; cheap to clone and share.
#[derive(Clone)]
pub struct IngestionCoordinator {
    upstream: Arc<dyn UpstreamClient>,
    catalog: Catalog,
    settle: SettlePolicy,
}

impl IngestionCoordinator {
    pub fn new(upstream: Arc<dyn UpstreamClient>, catalog: Catalog, settle: SettlePolicy) -> Self {
        Self {
            upstream,
            catalog,
            settle,
        }
    }

    /// Validate, forward and interpret, without reading anything back.
    ///
    /// Only validation failures are returned as `Err`; once the request has
    /// been forwarded every result, including a transport failure
    /// (`status_code: 0`), is an [`IngestionOutcome`].
    pub async fn submit(&self, request: &UploadRequest) -> Result<IngestionOutcome, IngestError> {
        request.validate()?;

        let outcome = match self.upstream.send(request).await {
            Ok(reply) => interpret(&reply),
            Err(IngestError::Transport(message)) => IngestionOutcome::UpstreamError {
                status_code: 0,
                message,
            },
            Err(err) => IngestionOutcome::UpstreamError {
                status_code: 0,
                message: err.to_string(),
            },
        };
        Ok(outcome)
    }

    /// Full ingestion: submit, then wait for the accepted record to appear.
    pub async fn ingest(&self, request: UploadRequest) -> Result<Ingested, IngestError> {
        let span = tracing::info_span!(
            "ingest.upload",
            product = %request.product,
            user_id = %request.user_id,
            file_size = request.file_size(),
        );
        async move {
            let start = Instant::now();
            let result = self.ingest_inner(&request).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(ingested) => info!(
                    analysis_id = %ingested.analysis_id,
                    elapsed_ms,
                    "ingest_success"
                ),
                Err(err) => warn!(outcome = err.label(), error = %err, elapsed_ms, "ingest_failure"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn ingest_inner(&self, request: &UploadRequest) -> Result<Ingested, IngestError> {
        match self.submit(request).await? {
            IngestionOutcome::Created { analysis_id } => {
                let analysis = self.settle_and_fetch(&analysis_id).await?;
                Ok(Ingested {
                    analysis_id,
                    analysis,
                })
            }
            IngestionOutcome::Rejected { message } => Err(IngestError::Rejected(message)),
            IngestionOutcome::UpstreamError {
                status_code: 0,
                message,
            } => Err(IngestError::Transport(message)),
            IngestionOutcome::UpstreamError {
                status_code,
                message,
            } => Err(IngestError::UpstreamProtocol {
                status: status_code,
                message,
            }),
        }
    }

    /// Wait the settle delay, then poll storage with capped exponential backoff.
    ///
    /// A storage error ends polling immediately as [`IngestError::Fetch`];
    /// exhausting every attempt without a hit is [`IngestError::NotYetVisible`].
    async fn settle_and_fetch(&self, analysis_id: &str) -> Result<Analysis, IngestError> {
        tokio::time::sleep(self.settle.initial_delay()).await;

        let attempts = self.settle.attempts.max(1);
        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(self.settle.backoff(attempt - 1)).await;
            }
            match self.catalog.analysis(analysis_id).await {
                Ok(Some(analysis)) => {
                    debug!(analysis_id, attempt, "accepted analysis visible");
                    return Ok(analysis);
                }
                Ok(None) => debug!(analysis_id, attempt, "accepted analysis not visible yet"),
                Err(source) => {
                    return Err(IngestError::Fetch {
                        analysis_id: analysis_id.to_string(),
                        source,
                    });
                }
            }
        }

        Err(IngestError::NotYetVisible {
            analysis_id: analysis_id.to_string(),
        })
    }
}
