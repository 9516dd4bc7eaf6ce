//! Error types for menu layout grouping.

use std::time::Duration;

use thiserror::Error;

/// Primary error type for grouping, fusion and ingestion.
///
/// Only `Geometry`, `FlowNotFound`, `Config`, `Io` and `Json` ever reach the
/// caller of a grouping flow. The semantic variants are produced inside the
/// fallback layer and turned into a degraded [`GroupingMode`] there.
///
/// [`GroupingMode`]: crate::decision::GroupingMode
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("invalid index {index} in semantic response: {msg}")]
    Validation { index: String, msg: &'static str },

    #[error("semantic grouping timed out after {0:?}")]
    Timeout(Duration),

    #[error("semantic provider failed: {0}")]
    Provider(String),

    #[error("malformed polygon for line {line}: {msg}")]
    Geometry { line: usize, msg: String },

    #[error("unparseable semantic response: {0}")]
    Parse(String),

    #[error("unknown flow '{requested}'. Available flows: {}", .available.join(", "))]
    FlowNotFound {
        requested: String,
        available: Vec<String>,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience Result type alias for LayoutError.
pub type Result<T> = std::result::Result<T, LayoutError>;
