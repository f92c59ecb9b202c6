//! Pagination, sorting and filtering for analysis listings.
//!
//! [`AnalysisQuery`] is what a caller asks for; [`PaginationParams`] and
//! [`AnalysisFilter`] are what reaches storage, after defaults and clamping.

use serde::{Deserialize, Serialize};

/// Page size used when the caller gives none (or zero).
pub const DEFAULT_LIMIT: i64 = 10;
/// Largest page size a caller may request.
pub const MAX_LIMIT: i64 = 100;

/// Column an analysis listing is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    DateTime,
    Id,
    Product,
}

impl SortBy {
    /// SQL column name. Only ever produced from this enum, never from input.
    pub fn column(self) -> &'static str {
        match self {
            SortBy::DateTime => "date_time",
            SortBy::Id => "id",
            SortBy::Product => "product",
        }
    }
}

/// Direction of an analysis listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Listing request as received from a client, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub sort_by: Option<SortBy>,
    #[serde(default)]
    pub sort_order: Option<SortOrder>,
}

impl AnalysisQuery {
    /// Split the raw query into the filter and page handed to storage.
    pub fn normalize(&self, user_id: i64) -> (AnalysisFilter, PaginationParams) {
        let filter = AnalysisFilter {
            user_id,
            product: non_empty(self.product.as_deref()),
            analysis_id: non_empty(self.id.as_deref()),
        };
        (filter, PaginationParams::from(self))
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Paging and ordering applied to a listing, already defaulted and clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationParams {
    pub limit: i64,
    pub offset: i64,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
        }
    }
}

impl From<&AnalysisQuery> for PaginationParams {
    fn from(query: &AnalysisQuery) -> Self {
        let limit = match query.limit {
            None => DEFAULT_LIMIT,
            Some(l) if l <= 0 => DEFAULT_LIMIT,
            Some(l) => l.min(MAX_LIMIT),
        };
        Self {
            limit,
            offset: query.offset.unwrap_or(0).max(0),
            sort_by: query.sort_by.unwrap_or_default(),
            sort_order: query.sort_order.unwrap_or_default(),
        }
    }
}

/// Row filter shared by the listing and its count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisFilter {
    pub user_id: i64,
    pub product: Option<String>,
    pub analysis_id: Option<String>,
}

/// One page of results plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(limit: Option<i64>) -> AnalysisQuery {
        AnalysisQuery {
            limit,
            ..Default::default()
        }
    }

    #[test]
    fn zero_limit_defaults() {
        assert_eq!(PaginationParams::from(&query(Some(0))).limit, 10);
        assert_eq!(PaginationParams::from(&query(None)).limit, 10);
        assert_eq!(PaginationParams::from(&query(Some(-3))).limit, 10);
    }

    #[test]
    fn large_limit_is_clamped() {
        assert_eq!(PaginationParams::from(&query(Some(500))).limit, 100);
        assert_eq!(PaginationParams::from(&query(Some(100))).limit, 100);
        assert_eq!(PaginationParams::from(&query(Some(25))).limit, 25);
    }

    #[test]
    fn sort_defaults_to_newest_first() {
        let page = PaginationParams::from(&AnalysisQuery::default());
        assert_eq!(page.sort_by, SortBy::DateTime);
        assert_eq!(page.sort_order, SortOrder::Desc);
        assert_eq!(page.sort_by.column(), "date_time");
        assert_eq!(page.sort_order.keyword(), "DESC");
    }

    #[test]
    fn negative_offset_is_zeroed() {
        let q = AnalysisQuery {
            offset: Some(-5),
            ..Default::default()
        };
        assert_eq!(PaginationParams::from(&q).offset, 0);
    }

    #[test]
    fn blank_filters_are_dropped() {
        let q = AnalysisQuery {
            product: Some("  ".into()),
            id: Some("42".into()),
            ..Default::default()
        };
        let (filter, _) = q.normalize(7);
        assert_eq!(filter.user_id, 7);
        assert_eq!(filter.product, None);
        assert_eq!(filter.analysis_id.as_deref(), Some("42"));
    }

    #[test]
    fn sort_fields_deserialize_from_wire_names() {
        let q: AnalysisQuery =
            serde_json::from_str(r#"{"sort_by":"product","sort_order":"asc"}"#).unwrap();
        assert_eq!(q.sort_by, Some(SortBy::Product));
        assert_eq!(q.sort_order, Some(SortOrder::Asc));
        assert!(serde_json::from_str::<AnalysisQuery>(r#"{"sort_by":"mass"}"#).is_err());
    }
}
