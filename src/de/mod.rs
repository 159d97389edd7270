//! Differential expression: two-group comparison and one-vs-rest markers.

pub mod markers;
pub mod two_group;

pub use markers::{find_markers, MarkerConfig, MarkerResult, REST};
pub use two_group::{test_two_groups, DeTable};

use crate::correct::adjust_or_fallback;
use crate::data::DeRecord;

/// Fill adjusted p-values across all records and sort by raw p-value.
///
/// Returns the fallback reason if BH correction could not be computed.
pub(crate) fn adjust_and_sort(records: &mut Vec<DeRecord>) -> Option<String> {
    let p_values: Vec<f64> = records.iter().map(|r| r.pvalue).collect();
    let adjusted = adjust_or_fallback(&p_values);
    let reason = adjusted.reason().map(String::from);
    for (record, padj) in records.iter_mut().zip(adjusted.into_value()) {
        record.padj = padj;
    }
    records.sort_by(|a, b| {
        a.pvalue
            .partial_cmp(&b.pvalue)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    reason
}
