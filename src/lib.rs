//! # EOD Analyst
//!
//! End-of-day analysis of exported personal tracking data.
//!
//! A language model drives a bounded conversation in which it runs Python in
//! a remote sandbox, optionally researches insights, and finally submits its
//! findings. The collected charts and findings are rendered into an HTML
//! report and optionally delivered to a webhook.
//!
//! ## Flow
//! 1. Discover and load CSV exports
//! 2. Upload them into a fresh sandbox
//! 3. Run the conversation loop (`session`)
//! 4. Render, save and deliver the report (`workflow`)
//!
//! ## Modules
//! - `session`: conversation driver, tool dispatch and result building
//! - `adapters`: sandbox and search service clients
//! - `llm`: completion client
//! - `api`: HTTP server tracking background analyses

pub mod adapters;
pub mod api;
pub mod config;
pub mod datasets;
pub mod delivery;
pub mod llm;
pub mod prompt;
pub mod report;
pub mod session;
pub mod util;
pub mod workflow;

pub use config::Config;
pub use workflow::{EndOfDayWorkflow, WorkflowError, WorkflowSummary};
