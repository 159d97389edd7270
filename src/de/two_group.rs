//! Welch t-test between two named groups for every feature.

use crate::data::{DeRecord, GroupAssignment};
use crate::de::adjust_and_sort;
use crate::error::{AnalysisError, Result};
use crate::normalize::NormalizedMatrix;
use crate::policy::MIN_GROUP_SIZE;
use crate::test::welch_t_test;
use log::{debug, info, warn};
use rayon::prelude::*;

/// A differential-expression table sorted ascending by raw p-value.
#[derive(Debug, Clone, PartialEq)]
pub struct DeTable {
    /// Records, most significant first.
    pub records: Vec<DeRecord>,
    /// Features whose test failed and were given p = 1.
    pub n_failed_tests: usize,
    /// Set when BH correction fell back to the raw p-values.
    pub correction_fallback: Option<String>,
}

impl DeTable {
    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The first `max` records, order preserved.
    pub fn truncated(&self, max: usize) -> Vec<DeRecord> {
        self.records.iter().take(max).cloned().collect()
    }
}

/// Test every feature of `norm` for a difference between `group_b` and
/// `group_a`.
///
/// Returns `Ok(None)` if either group has fewer than two samples. The
/// assignment must cover exactly the samples of `norm`, in order.
pub fn test_two_groups(
    norm: &NormalizedMatrix,
    assignment: &GroupAssignment,
    group_a: &str,
    group_b: &str,
) -> Result<Option<DeTable>> {
    if assignment.labels() != norm.sample_ids.as_slice() {
        return Err(AnalysisError::SampleMismatch(
            "group assignment does not match the matrix samples".to_string(),
        ));
    }

    let idx_a = assignment.indices_of(group_a);
    let idx_b = assignment.indices_of(group_b);
    if idx_a.len() < MIN_GROUP_SIZE || idx_b.len() < MIN_GROUP_SIZE {
        warn!(
            "Skipping differential expression: '{}' has {} and '{}' has {} sample(s)",
            group_a,
            idx_a.len(),
            group_b,
            idx_b.len()
        );
        return Ok(None);
    }

    let rows: Vec<(DeRecord, bool)> = (0..norm.n_features())
        .into_par_iter()
        .map(|i| {
            let a = norm.row_at(i, &idx_a);
            let b = norm.row_at(i, &idx_b);
            let mean_a = a.iter().sum::<f64>() / a.len() as f64;
            let mean_b = b.iter().sum::<f64>() / b.len() as f64;
            let outcome = welch_t_test(&a, &b);
            let record = DeRecord {
                gene: norm.feature_ids[i].clone(),
                log2fc: mean_b - mean_a,
                pvalue: outcome.p_value(),
                padj: f64::NAN,
                group_a: group_a.to_string(),
                group_b: group_b.to_string(),
                cluster: None,
                statistic: outcome.statistic(),
                mean_a,
                mean_b,
            };
            (record, outcome.is_failed())
        })
        .collect();

    let n_failed_tests = rows.iter().filter(|(_, failed)| *failed).count();
    if n_failed_tests > 0 {
        debug!("{} feature test(s) failed and were given p = 1", n_failed_tests);
    }
    let mut records: Vec<DeRecord> = rows.into_iter().map(|(r, _)| r).collect();
    let correction_fallback = adjust_and_sort(&mut records);

    info!(
        "Differential expression {} vs {}: {} features tested ({} vs {} samples)",
        group_b,
        group_a,
        records.len(),
        idx_b.len(),
        idx_a.len()
    );

    Ok(Some(DeTable {
        records,
        n_failed_tests,
        correction_fallback,
    }))
}
