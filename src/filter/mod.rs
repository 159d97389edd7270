//! Quality-control filtering of features and cells.

pub mod cells;
pub mod features;

pub use cells::filter_cells;
pub use features::filter_features;

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};

/// Statistics about one filtering step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterReport {
    /// What was filtered ("features" or "cells").
    pub axis: String,
    /// Minimum detection count applied.
    pub threshold: usize,
    /// Count before filtering.
    pub n_before: usize,
    /// Count after filtering.
    pub n_after: usize,
    /// Count removed.
    pub n_removed: usize,
    /// Proportion retained.
    pub retention_rate: f64,
}

impl FilterReport {
    pub(crate) fn new(axis: &str, threshold: usize, n_before: usize, n_after: usize) -> Self {
        Self {
            axis: axis.to_string(),
            threshold,
            n_before,
            n_after,
            n_removed: n_before - n_after,
            retention_rate: if n_before > 0 {
                n_after as f64 / n_before as f64
            } else {
                0.0
            },
        }
    }
}

impl std::fmt::Display for FilterReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Filter Result ({}, threshold {})", self.axis, self.threshold)?;
        writeln!(f, "  Before:    {}", self.n_before)?;
        writeln!(f, "  After:     {}", self.n_after)?;
        writeln!(f, "  Removed:   {}", self.n_removed)?;
        writeln!(f, "  Retained:  {:.1}%", self.retention_rate * 100.0)?;
        Ok(())
    }
}

/// Fail with an input error when too few features or samples remain.
pub fn require_remaining(what: &'static str, remaining: usize, required: usize) -> Result<()> {
    if remaining < required {
        return Err(AnalysisError::InsufficientData {
            what,
            remaining,
            required,
        });
    }
    Ok(())
}
