//! Bulk and single-cell analysis pipelines.
//!
//! Each pipeline runs filtering, normalization, reduction, grouping and
//! differential expression in that order and assembles one
//! [`AnalysisResult`](crate::data::AnalysisResult). Only
//! [`AnalysisError::InsufficientData`](crate::error::AnalysisError) is
//! expected to fail a run; everything else that can go wrong on real data is
//! recorded in the result's notes.

mod bulk;
mod runner;
mod single_cell;

pub use bulk::BulkPipeline;
pub use runner::Analyzer;
pub use single_cell::SingleCellPipeline;

use crate::data::DeRecord;
use crate::de::DeTable;
use crate::detect::DataType;
use crate::error::Result;
use crate::normalize::NormalizedMatrix;
use crate::policy;
use crate::reduce::{observations, pca, standardize, top_variable_features, Pca};
use log::debug;

/// Select variable features, standardize them and run PCA.
///
/// Returns the selected feature indices alongside the PCA so callers can
/// reuse the same features.
fn principal_components(norm: &NormalizedMatrix, data_type: DataType) -> Result<(Vec<usize>, Pca)> {
    let n_variable = policy::n_variable_features(data_type, norm.n_features());
    let features = top_variable_features(norm, n_variable);
    let x = standardize(&observations(norm, &features));
    let n_components = policy::n_pca_components(data_type, norm.n_samples(), features.len());
    let result = pca(&x, n_components)?;
    debug!(
        "PCA on {} variable features: {} components, PC1 explains {:.1}%",
        features.len(),
        result.n_components(),
        result.variance_ratio.first().copied().unwrap_or(0.0) * 100.0
    );
    Ok((features, result))
}

/// Truncate a DE table for transport, noting any recovered failures.
///
/// Returns the kept records and the untruncated record count.
fn de_section(table: DeTable, max_records: usize, notes: &mut Vec<String>) -> (Vec<DeRecord>, usize) {
    if table.n_failed_tests > 0 {
        notes.push(format!(
            "{} feature test(s) failed and were given p = 1",
            table.n_failed_tests
        ));
    }
    if let Some(reason) = &table.correction_fallback {
        notes.push(format!("BH correction failed ({}); padj = pvalue", reason));
    }
    let n_tested = table.len();
    (table.truncated(max_records), n_tested)
}
