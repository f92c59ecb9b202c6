//! End-to-end flow through `AnalysisService`: upload, read-back, listing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use analysis::{
    AnalysisQuery, AnalysisRow, AnalysisService, InMemoryRepository, IngestError,
    IngestionOutcome, SettlePolicy, UploadRequest, UpstreamClient, UpstreamReply,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};

/// Engine double that assigns sequential identifiers and writes the row,
/// the way the real engine populates the shared database.
struct SequentialEngine {
    repo: Arc<InMemoryRepository>,
    next: AtomicUsize,
}

impl SequentialEngine {
    fn new(repo: Arc<InMemoryRepository>) -> Arc<Self> {
        Arc::new(Self {
            repo,
            next: AtomicUsize::new(1),
        })
    }
}

#[async_trait]
impl UpstreamClient for SequentialEngine {
    async fn send(&self, request: &UploadRequest) -> Result<UpstreamReply, IngestError> {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        let analysis_id = format!("{}", 9000 + n);
        self.repo
            .insert_analysis(AnalysisRow {
                id: n as i32,
                date_time: Utc.timestamp_opt(1_700_000_000 + n as i64, 0).single(),
                product: request.product.clone(),
                id_user: request.user_id.clone(),
                file_source: request.file_name.clone(),
                id_analysis: analysis_id.clone(),
                ..Default::default()
            })
            .map_err(|e| IngestError::Transport(e.to_string()))?;
        Ok(UpstreamReply::new(
            200,
            format!(r#"{{"Response":"{analysis_id}"}}"#),
        ))
    }
}

fn service() -> AnalysisService {
    let repo = Arc::new(InMemoryRepository::new());
    let engine = SequentialEngine::new(repo.clone());
    AnalysisService::new(repo, engine, SettlePolicy::immediate())
}

fn request(product: &str, user: &str, file: &str) -> UploadRequest {
    UploadRequest::new(product, user, file, Bytes::from_static(b"\xFF\xD8\xFF"))
}

#[tokio::test]
async fn uploads_become_listable_newest_first() {
    let service = service();

    for (product, file) in [("rose", "a.jpg"), ("tulip", "b.jpg"), ("rose", "c.jpg")] {
        let ingested = service
            .coordinator()
            .ingest(request(product, "42", file))
            .await
            .expect("upload should be ingested");
        assert_eq!(ingested.analysis.product, product);
        assert_eq!(ingested.analysis.file_source, file);
        assert_eq!(ingested.analysis.objects.as_deref(), Some(&[][..]));
    }

    let page = service
        .catalog()
        .list_analyses(42, &AnalysisQuery::default())
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    let files: Vec<_> = page.data.iter().map(|a| a.file_source.as_str()).collect();
    assert_eq!(files, ["c.jpg", "b.jpg", "a.jpg"]);
}

#[tokio::test]
async fn other_users_see_nothing() {
    let service = service();
    service
        .coordinator()
        .ingest(request("rose", "42", "a.jpg"))
        .await
        .unwrap();

    let page = service
        .catalog()
        .list_analyses(7, &AnalysisQuery::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0);
    assert!(page.data.is_empty());
}

#[tokio::test]
async fn submit_reports_identifier_without_read_back() {
    let service = service();
    let outcome = service
        .coordinator()
        .submit(&request("rose", "42", "a.jpg"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        IngestionOutcome::Created {
            analysis_id: "9001".into()
        }
    );
}

#[tokio::test]
async fn validation_failure_leaves_storage_untouched() {
    let service = service();
    let err = service
        .coordinator()
        .ingest(request("rose", "", "a.jpg"))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Validation(_)));

    let page = service
        .catalog()
        .list_analyses(42, &AnalysisQuery::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_uploads_get_distinct_identifiers() {
    let service = service();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .coordinator()
                    .ingest(request("rose", "42", &format!("{i}.jpg")))
                    .await
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        let ingested = handle.await.unwrap().expect("concurrent upload failed");
        ids.push(ingested.analysis_id);
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 16);

    let page = service
        .catalog()
        .list_analyses(
            42,
            &AnalysisQuery {
                limit: Some(100),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 16);
}
