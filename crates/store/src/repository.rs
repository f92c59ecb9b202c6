use async_trait::async_trait;

use crate::models::{AnalysisRow, Object, ObjectMetadata};
use crate::query::{AnalysisFilter, PaginationParams};
use crate::StoreError;

/// Read-only access to the analysis store.
///
/// This allows for different storage implementations (Postgres in
/// production, in-memory for tests). All methods fail with [`StoreError`] on
/// connectivity or query failure and never return partial results.
#[async_trait]
pub trait AnalysisRepository: Send + Sync {
    /// List analyses owned by `filter.user_id`, ordered and paged by `page`.
    async fn find_analyses(
        &self,
        filter: &AnalysisFilter,
        page: &PaginationParams,
    ) -> Result<Vec<AnalysisRow>, StoreError>;

    /// Count analyses matching the same filter as [`find_analyses`](Self::find_analyses).
    async fn count_analyses(&self, filter: &AnalysisFilter) -> Result<i64, StoreError>;

    /// Look up one analysis by the identifier the analysis engine assigned.
    async fn find_analysis_by_id(&self, analysis_id: &str)
        -> Result<Option<AnalysisRow>, StoreError>;

    /// Objects detected in the analysis with the given internal row id.
    async fn find_objects_by_analysis_id(&self, id: i64) -> Result<Vec<Object>, StoreError>;

    /// Object measurements for an explicit list of object ids.
    async fn find_objects_by_ids(&self, ids: &[i32]) -> Result<Vec<ObjectMetadata>, StoreError>;

    /// Check the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Release pooled connections.
    async fn close(&self) {}
}
