//! Analysis ingestion
//!
//! This is where new images enter the system. A caller hands over a product
//! name, a user id and a file; we forward it to the external analysis engine,
//! make sense of whatever it replies, and read the resulting analysis back
//! from shared storage.
//!
//! ## What we do here
//!
//! - **Validate before the network** - empty product, user or file never
//!   leaves the process.
//! - **Forward once** - one multipart POST with `product`, `userID` and
//!   `files`, bounded by a total deadline. No retries.
//! - **Interpret by status** - `200` carries the new id, `400` carries a
//!   rejection reason, anything else is an engine failure. See [`interpret`].
//! - **Settle and fetch** - the engine writes to storage after replying, so
//!   we wait and poll with capped backoff. See [`SettlePolicy`].
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ingest::{HttpUpstreamClient, IngestionCoordinator, SettlePolicy, UploadRequest, UpstreamConfig};
//! use store::{Catalog, InMemoryRepository};
//!
//! # async fn run() -> Result<(), ingest::IngestError> {
//! let client = HttpUpstreamClient::new(&UpstreamConfig::new("http://engine:5000/analyze"))?;
//! let catalog = Catalog::new(Arc::new(InMemoryRepository::new()));
//! let coordinator = IngestionCoordinator::new(Arc::new(client), catalog, SettlePolicy::default());
//!
//! let upload = UploadRequest::new("rose", "42", "leaf.jpg", std::fs::read("leaf.jpg").unwrap());
//! let ingested = coordinator.ingest(upload).await?;
//! println!("analysis {} has {} objects", ingested.analysis_id, ingested.analysis.objects.map_or(0, |o| o.len()));
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod coordinator;
mod error;
mod reply;
mod types;

pub use crate::client::{HttpUpstreamClient, UpstreamClient};
pub use crate::config::{ConfigError, SettlePolicy, UpstreamConfig};
pub use crate::coordinator::IngestionCoordinator;
pub use crate::error::IngestError;
pub use crate::reply::{interpret, ReplyBody};
pub use crate::types::{Ingested, IngestionOutcome, UploadRequest, UpstreamReply};
