//! Benjamini-Hochberg false discovery rate correction.

use crate::error::{AnalysisError, Result};
use crate::outcome::Outcome;
use log::warn;
use serde::{Deserialize, Serialize};

/// Result of BH correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BhCorrected {
    /// Original p-values.
    pub p_values: Vec<f64>,
    /// Adjusted p-values (q-values), in input order.
    pub q_values: Vec<f64>,
    /// Number of tests.
    pub n_tests: usize,
}

impl BhCorrected {
    /// Count significant results at a threshold.
    pub fn n_significant(&self, alpha: f64) -> usize {
        self.q_values.iter().filter(|&&q| q < alpha).count()
    }
}

/// Apply Benjamini-Hochberg FDR correction.
///
/// For p-values sorted ascending, the adjusted value at rank i is
/// `q[i] = min(p[i] * n / i, q[i+1])`, capped at 1.
///
/// Fails on empty input or on p-values that are not finite numbers in [0, 1].
pub fn correct_bh(p_values: &[f64]) -> Result<BhCorrected> {
    let n = p_values.len();
    if n == 0 {
        return Err(AnalysisError::EmptyData(
            "No p-values to correct".to_string(),
        ));
    }
    if let Some(p) = p_values.iter().find(|p| !(0.0..=1.0).contains(*p)) {
        return Err(AnalysisError::Numerical(format!("Invalid p-value {}", p)));
    }

    // Create sorted index
    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&a, &b| {
        p_values[a]
            .partial_cmp(&p_values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut q_sorted = vec![0.0; n];
    let n_f64 = n as f64;

    // Start from largest p-value
    q_sorted[n - 1] = p_values[indices[n - 1]].min(1.0);

    // Work backwards
    for i in (0..n - 1).rev() {
        let rank = i + 1;
        let adjusted = p_values[indices[i]] * n_f64 / rank as f64;
        q_sorted[i] = adjusted.min(q_sorted[i + 1]).min(1.0);
    }

    // Restore original order
    let mut q_values = vec![0.0; n];
    for (i, &orig_idx) in indices.iter().enumerate() {
        q_values[orig_idx] = q_sorted[i];
    }

    Ok(BhCorrected {
        p_values: p_values.to_vec(),
        q_values,
        n_tests: n,
    })
}

/// Adjusted p-values, or the raw p-values if correction fails.
pub fn adjust_or_fallback(p_values: &[f64]) -> Outcome<Vec<f64>> {
    match correct_bh(p_values) {
        Ok(corrected) => Outcome::Computed(corrected.q_values),
        Err(e) => {
            warn!("BH correction failed ({}); using raw p-values", e);
            Outcome::Fallback {
                value: p_values.to_vec(),
                reason: e.to_string(),
            }
        }
    }
}
