use std::sync::Arc;

use tracing::{debug, warn};

use crate::models::{Analysis, Object, ObjectMetadata};
use crate::query::{AnalysisQuery, Page};
use crate::{AnalysisRepository, StoreError};

/// Query layer over an [`AnalysisRepository`].
///
/// Applies paging defaults before delegating, converts rows into API models
/// and attaches objects to single-analysis lookups. Cheap to clone.
#[derive(Clone)]
pub struct Catalog {
    repo: Arc<dyn AnalysisRepository>,
}

impl Catalog {
    pub fn new(repo: Arc<dyn AnalysisRepository>) -> Self {
        Self { repo }
    }

    /// One page of the caller's analyses plus the total matching count.
    pub async fn list_analyses(
        &self,
        user_id: i64,
        query: &AnalysisQuery,
    ) -> Result<Page<Analysis>, StoreError> {
        let (filter, page) = query.normalize(user_id);
        debug!(
            user_id,
            limit = page.limit,
            offset = page.offset,
            sort_by = page.sort_by.column(),
            "listing analyses"
        );

        let rows = self.repo.find_analyses(&filter, &page).await?;
        let total = self.repo.count_analyses(&filter).await?;

        Ok(Page {
            data: rows.into_iter().map(Analysis::from).collect(),
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    /// Look up an analysis by its engine-assigned identifier, with its objects.
    pub async fn analysis(&self, analysis_id: &str) -> Result<Option<Analysis>, StoreError> {
        let Some(row) = self.repo.find_analysis_by_id(analysis_id).await? else {
            return Ok(None);
        };
        let objects = self.objects_of(i64::from(row.id)).await?;

        let mut analysis = Analysis::from(row);
        analysis.objects = Some(objects);
        Ok(Some(analysis))
    }

    /// Objects of the analysis with the given internal row id, as received
    /// from a caller. A non-numeric id is [`StoreError::InvalidId`].
    pub async fn analysis_objects(&self, internal_id: &str) -> Result<Vec<Object>, StoreError> {
        let internal_id = internal_id
            .trim()
            .parse::<i64>()
            .map_err(|_| StoreError::InvalidId(internal_id.to_string()))?;
        self.objects_of(internal_id).await
    }

    async fn objects_of(&self, internal_id: i64) -> Result<Vec<Object>, StoreError> {
        self.repo
            .find_objects_by_analysis_id(internal_id)
            .await
            .inspect_err(|err| warn!(internal_id, error = %err, "failed to load objects"))
    }

    pub async fn objects(&self, ids: &[i32]) -> Result<Vec<ObjectMetadata>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.repo.find_objects_by_ids(ids).await
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.repo.ping().await
    }

    /// Release backend resources. Called once at shutdown.
    pub async fn close(&self) {
        self.repo.close().await
    }
}
