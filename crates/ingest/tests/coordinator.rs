//! Coordinator behaviour against a scripted engine and in-memory storage.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ingest::{
    IngestError, IngestionCoordinator, IngestionOutcome, SettlePolicy, UploadRequest,
    UpstreamClient, UpstreamReply,
};
use store::{AnalysisRow, Catalog, InMemoryRepository, Object, StoreError};

/// Engine double: replies with a fixed status/body and counts calls.
struct ScriptedEngine {
    status: u16,
    body: &'static str,
    calls: AtomicUsize,
    unreachable: bool,
}

impl ScriptedEngine {
    fn replying(status: u16, body: &'static str) -> Arc<Self> {
        Arc::new(Self {
            status,
            body,
            calls: AtomicUsize::new(0),
            unreachable: false,
        })
    }

    fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            status: 0,
            body: "",
            calls: AtomicUsize::new(0),
            unreachable: true,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamClient for ScriptedEngine {
    async fn send(&self, request: &UploadRequest) -> Result<UpstreamReply, IngestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(!request.content.is_empty());
        if self.unreachable {
            return Err(IngestError::Transport("connection refused".into()));
        }
        Ok(UpstreamReply::new(self.status, self.body))
    }
}

/// Storage that is never reachable.
struct DownRepository;

#[async_trait]
impl store::AnalysisRepository for DownRepository {
    async fn find_analyses(
        &self,
        _: &store::AnalysisFilter,
        _: &store::PaginationParams,
    ) -> Result<Vec<AnalysisRow>, StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }

    async fn count_analyses(&self, _: &store::AnalysisFilter) -> Result<i64, StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }

    async fn find_analysis_by_id(&self, _: &str) -> Result<Option<AnalysisRow>, StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }

    async fn find_objects_by_analysis_id(&self, _: i64) -> Result<Vec<Object>, StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }

    async fn find_objects_by_ids(
        &self,
        _: &[i32],
    ) -> Result<Vec<store::ObjectMetadata>, StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }
}

fn fast_settle(attempts: u32) -> SettlePolicy {
    SettlePolicy {
        initial_delay_ms: 0,
        attempts,
        backoff_ms: 5,
        max_backoff_ms: 20,
    }
}

fn rose_upload() -> UploadRequest {
    UploadRequest::new("rose", "42", "leaf.jpg", &b"\xff\xd8\xff\xe0jpeg"[..])
}

fn stored(analysis_id: &str) -> AnalysisRow {
    AnalysisRow {
        id: 7,
        id_user: "42".into(),
        product: "rose".into(),
        id_analysis: analysis_id.into(),
        ..Default::default()
    }
}

fn coordinator(
    engine: Arc<ScriptedEngine>,
    repo: Arc<InMemoryRepository>,
    settle: SettlePolicy,
) -> IngestionCoordinator {
    IngestionCoordinator::new(engine, Catalog::new(repo), settle)
}

#[tokio::test]
async fn accepted_upload_is_created() {
    let engine = ScriptedEngine::replying(200, r#"{"Response":"abc123"}"#);
    let repo = Arc::new(InMemoryRepository::new());
    let coord = coordinator(engine.clone(), repo, fast_settle(1));

    let outcome = coord.submit(&rose_upload()).await.unwrap();
    assert_eq!(
        outcome,
        IngestionOutcome::Created {
            analysis_id: "abc123".into()
        }
    );
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn empty_product_never_reaches_the_engine() {
    let engine = ScriptedEngine::replying(200, r#"{"Response":"abc123"}"#);
    let coord = coordinator(
        engine.clone(),
        Arc::new(InMemoryRepository::new()),
        fast_settle(1),
    );

    let upload = UploadRequest::new("", "42", "leaf.jpg", &b"jpeg"[..]);
    let err = coord.submit(&upload).await.unwrap_err();
    assert!(matches!(err, IngestError::Validation(_)));

    let err = coord.ingest(upload).await.unwrap_err();
    assert!(matches!(err, IngestError::Validation(_)));
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn duplicate_file_is_rejected_with_engine_message() {
    let engine = ScriptedEngine::replying(400, r#"{"Response":"duplicate file"}"#);
    let coord = coordinator(engine, Arc::new(InMemoryRepository::new()), fast_settle(1));

    let err = coord.ingest(rose_upload()).await.unwrap_err();
    match err {
        IngestError::Rejected(message) => assert_eq!(message, "duplicate file"),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn engine_crash_is_a_gateway_failure() {
    let engine = ScriptedEngine::replying(500, "<html>Internal Server Error</html>");
    let coord = coordinator(engine, Arc::new(InMemoryRepository::new()), fast_settle(1));

    let err = coord.ingest(rose_upload()).await.unwrap_err();
    assert!(err.is_gateway());
    assert!(matches!(err, IngestError::UpstreamProtocol { status: 500, .. }));
}

#[tokio::test]
async fn unreachable_engine_is_status_zero() {
    let engine = ScriptedEngine::unreachable();
    let coord = coordinator(
        engine.clone(),
        Arc::new(InMemoryRepository::new()),
        fast_settle(1),
    );

    let outcome = coord.submit(&rose_upload()).await.unwrap();
    assert_eq!(
        outcome,
        IngestionOutcome::UpstreamError {
            status_code: 0,
            message: "connection refused".into()
        }
    );

    let err = coord.ingest(rose_upload()).await.unwrap_err();
    assert!(matches!(err, IngestError::Transport(ref message) if message == "connection refused"));
    assert_eq!(
        err.to_string(),
        "analysis engine unreachable: connection refused"
    );
    assert_eq!(engine.calls(), 2);
}

#[tokio::test]
async fn ingest_reads_back_the_stored_record() {
    let engine = ScriptedEngine::replying(200, r#"{"Response":"9001"}"#);
    let repo = Arc::new(InMemoryRepository::new());
    repo.insert_analysis(stored("9001")).unwrap();
    repo.insert_object(Object {
        id: 1,
        id_analysis: 7,
        ..Default::default()
    })
    .unwrap();
    let coord = coordinator(engine, repo, fast_settle(1));

    let ingested = coord.ingest(rose_upload()).await.unwrap();
    assert_eq!(ingested.analysis_id, "9001");
    assert_eq!(ingested.analysis.id_analysis, 9001);
    assert_eq!(ingested.analysis.objects.map(|o| o.len()), Some(1));
}

#[tokio::test(start_paused = true)]
async fn late_write_is_found_by_polling() {
    let engine = ScriptedEngine::replying(200, r#"{"Response":"555"}"#);
    let repo = Arc::new(InMemoryRepository::new());
    let settle = SettlePolicy {
        initial_delay_ms: 100,
        attempts: 5,
        backoff_ms: 100,
        max_backoff_ms: 400,
    };
    let coord = coordinator(engine, repo.clone(), settle);

    // Polls land at 100, 200, 400 and 800 ms of virtual time.
    let writer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        repo.insert_analysis(stored("555")).unwrap();
    });

    let start = tokio::time::Instant::now();
    let ingested = coord.ingest(rose_upload()).await.unwrap();
    assert_eq!(ingested.analysis_id, "555");
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(400) && elapsed < Duration::from_millis(800));
    writer.await.unwrap();
}

#[tokio::test]
async fn missing_record_is_not_yet_visible() {
    let engine = ScriptedEngine::replying(200, r#"{"Response":"abc123"}"#);
    let coord = coordinator(engine, Arc::new(InMemoryRepository::new()), fast_settle(3));

    let err = coord.ingest(rose_upload()).await.unwrap_err();
    assert!(matches!(err, IngestError::NotYetVisible { ref analysis_id } if analysis_id == "abc123"));
    assert!(!err.is_gateway());
}

#[tokio::test]
async fn storage_failure_after_acceptance_is_a_fetch_error() {
    let engine = ScriptedEngine::replying(200, r#"{"Response":"abc123"}"#);
    let coord = IngestionCoordinator::new(
        engine,
        Catalog::new(Arc::new(DownRepository)),
        fast_settle(5),
    );

    let err = coord.ingest(rose_upload()).await.unwrap_err();
    assert!(matches!(err, IngestError::Fetch { .. }));
    assert_eq!(err.accepted_id(), Some("abc123"));
}
