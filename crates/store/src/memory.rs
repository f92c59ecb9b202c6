use std::cmp::Ordering;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::models::{AnalysisRow, Object, ObjectMetadata};
use crate::query::{AnalysisFilter, PaginationParams, SortBy, SortOrder};
use crate::{AnalysisRepository, StoreError};

/// An in-memory repository using `RwLock`s around plain vectors.
///
/// Mirrors the filtering, ordering and paging of the Postgres backend. Used by
/// tests and local development; records can be inserted at any time to
/// simulate the analysis engine writing into shared storage.
#[derive(Default)]
pub struct InMemoryRepository {
    analyses: RwLock<Vec<AnalysisRow>>,
    objects: RwLock<Vec<Object>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_analysis(&self, row: AnalysisRow) -> Result<(), StoreError> {
        let mut analyses = self.analyses.write().map_err(lock_poisoned)?;
        analyses.push(row);
        Ok(())
    }

    pub fn insert_object(&self, object: Object) -> Result<(), StoreError> {
        let mut objects = self.objects.write().map_err(lock_poisoned)?;
        objects.push(object);
        Ok(())
    }

    fn matching(&self, filter: &AnalysisFilter) -> Result<Vec<AnalysisRow>, StoreError> {
        let analyses = self.analyses.read().map_err(lock_poisoned)?;
        let user = filter.user_id.to_string();
        Ok(analyses
            .iter()
            .filter(|row| row.id_user == user)
            .filter(|row| filter.product.as_ref().is_none_or(|p| &row.product == p))
            .filter(|row| {
                filter
                    .analysis_id
                    .as_ref()
                    .is_none_or(|id| &row.id_analysis == id)
            })
            .cloned()
            .collect())
    }
}

fn lock_poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("in-memory store lock poisoned".to_string())
}

fn compare(a: &AnalysisRow, b: &AnalysisRow, sort_by: SortBy) -> Ordering {
    let primary = match sort_by {
        SortBy::DateTime => a.date_time.cmp(&b.date_time),
        SortBy::Id => a.id.cmp(&b.id),
        SortBy::Product => a.product.cmp(&b.product),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl AnalysisRepository for InMemoryRepository {
    async fn find_analyses(
        &self,
        filter: &AnalysisFilter,
        page: &PaginationParams,
    ) -> Result<Vec<AnalysisRow>, StoreError> {
        let mut rows = self.matching(filter)?;
        rows.sort_by(|a, b| {
            let ord = compare(a, b, page.sort_by);
            match page.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        let offset = usize::try_from(page.offset).unwrap_or(0);
        let limit = usize::try_from(page.limit).unwrap_or(0);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_analyses(&self, filter: &AnalysisFilter) -> Result<i64, StoreError> {
        Ok(self.matching(filter)?.len() as i64)
    }

    async fn find_analysis_by_id(
        &self,
        analysis_id: &str,
    ) -> Result<Option<AnalysisRow>, StoreError> {
        let analyses = self.analyses.read().map_err(lock_poisoned)?;
        Ok(analyses
            .iter()
            .find(|row| row.id_analysis == analysis_id)
            .cloned())
    }

    async fn find_objects_by_analysis_id(&self, id: i64) -> Result<Vec<Object>, StoreError> {
        let objects = self.objects.read().map_err(lock_poisoned)?;
        let mut found: Vec<Object> = objects
            .iter()
            .filter(|o| o.id_analysis == id)
            .cloned()
            .collect();
        found.sort_by_key(|o| o.id);
        Ok(found)
    }

    async fn find_objects_by_ids(&self, ids: &[i32]) -> Result<Vec<ObjectMetadata>, StoreError> {
        let objects = self.objects.read().map_err(lock_poisoned)?;
        let mut found: Vec<ObjectMetadata> = objects
            .iter()
            .filter(|o| ids.contains(&o.id))
            .map(ObjectMetadata::from)
            .collect();
        found.sort_by_key(|o| o.id);
        Ok(found)
    }
}
