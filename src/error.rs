//! Error types for the geolyze analysis core.

use thiserror::Error;

/// Main error type for the library.
///
/// Only [`AnalysisError::InsufficientData`] is expected to fail a pipeline run
/// on real data; the recoverable conditions (per-feature test failures,
/// correction failures, ambiguous grouping, embedding failures) are carried as
/// values and never surface here.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Sample ID mismatch: {0}")]
    SampleMismatch(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    /// Too few features or samples survive filtering for downstream statistics.
    #[error("Too few {what} after filtering: {remaining} remain, at least {required} required")]
    InsufficientData {
        what: &'static str,
        remaining: usize,
        required: usize,
    },

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Status sink error: {0}")]
    StatusSink(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AnalysisError {
    /// Whether this error is a user-facing input problem rather than an
    /// internal failure.
    pub fn is_input_error(&self) -> bool {
        matches!(self, AnalysisError::InsufficientData { .. })
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;
