//! HTTP API for the end-of-day analyst.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check
//! - `POST /api/analyze` - Start an analysis in the background
//! - `GET /api/analyses` - List tracked analyses
//! - `GET /api/status/{id}` - Get analysis status and result
//! - `DELETE /api/status/{id}` - Drop an analysis record
//! - `GET /api/logs/{id}` - Get the checkpoint log of an analysis

pub mod analysis_store;
mod routes;
pub mod types;

pub use routes::{router, serve, AppState};
pub use types::*;
