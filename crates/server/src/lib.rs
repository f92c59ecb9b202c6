//! Analysis Server - HTTP REST API for image-analysis results
//!
//! This crate exposes stored analyses and the upload pipeline over HTTP:
//!
//! - **Analyses**: paginated listing per caller, lookup with objects, uploads
//!   forwarded to the analysis engine
//! - **Objects**: bulk measurement lookup by id
//! - **Health & Metrics**: liveness/readiness probes and Prometheus metrics
//!
//! # Response envelope
//!
//! Every JSON response is rewritten by [`envelope::normalize`] into
//! `{"success": true, "result": ...}` or
//! `{"success": false, "error": {"code", "message", "details"?, "path"}}`.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! - `GET /api/v1/health` - Liveness
//! - `GET /api/v1/analyses` - List the caller's analyses (`Telegram-User-ID` header)
//! - `GET /api/v1/analyses/{id}` - One analysis with its objects
//! - `GET /api/v1/analyses/{id}/objects` - Objects of one analysis
//! - `POST /api/v1/analyses` - Multipart upload (`product`, `userID`, `file`)
//! - `POST /api/v1/objects` - Bulk object lookup (`{"objects": [ids]}`)
//! - `GET /ready` - Readiness (database ping)
//! - `GET /metrics` - Prometheus metrics

pub mod config;
pub mod envelope;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use envelope::{ChainFailure, ResponseEnvelope};
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
