//! Storage layer for image-analysis results.
//!
//! The analysis engine writes analyses and their detected objects into a
//! shared database; this crate only reads them back. It provides:
//!
//! - [`models`]: rows as stored and the shapes served to clients
//! - [`query`]: paging, sorting and filtering with defaults and clamping
//! - [`AnalysisRepository`]: the narrow read-only interface, implemented by
//!   [`PgRepository`] (sqlx) and [`InMemoryRepository`]
//! - [`Catalog`]: the query layer the HTTP surface and ingestion use
//!
//! ```no_run
//! use std::sync::Arc;
//! use store::{AnalysisQuery, Catalog, PgRepository, PoolConfig};
//!
//! # async fn run() -> Result<(), store::StoreError> {
//! let repo = PgRepository::connect(&PoolConfig::default()).await?;
//! let catalog = Catalog::new(Arc::new(repo));
//! let page = catalog.list_analyses(42, &AnalysisQuery::default()).await?;
//! println!("{} of {}", page.data.len(), page.total);
//! # Ok(())
//! # }
//! ```

mod catalog;
mod error;
mod memory;
pub mod models;
mod postgres;
pub mod query;
mod repository;

pub use catalog::Catalog;
pub use error::StoreError;
pub use memory::InMemoryRepository;
pub use models::{Analysis, AnalysisRow, Measurements, Object, ObjectMetadata, Stats};
pub use postgres::{PgRepository, PoolConfig};
pub use query::{
    AnalysisFilter, AnalysisQuery, Page, PaginationParams, SortBy, SortOrder, DEFAULT_LIMIT,
    MAX_LIMIT,
};
pub use repository::AnalysisRepository;
