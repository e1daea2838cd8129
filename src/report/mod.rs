//! Report writers over finished run results.
//!
//! The core guarantees `RunResults` is plain serializable data; writers
//! here turn it into a JSON file and a terminal summary.

pub mod json;
pub mod terminal;

use thiserror::Error;

pub use json::write_json_report;
pub use terminal::render_summary;

/// Errors that can occur while writing reports.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
