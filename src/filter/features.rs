//! Feature filtering by total signal and detection count.

use crate::data::ExpressionMatrix;
use crate::detect::DataType;
use crate::error::Result;
use crate::filter::FilterReport;
use crate::policy;
use log::debug;

/// Drop features with non-positive total signal or detected (value > 0) in
/// fewer samples than the adaptive minimum for the data type.
///
/// For single-cell data this should run on the cell-filtered matrix, since
/// the minimum depends on the remaining cell count.
pub fn filter_features(
    matrix: &ExpressionMatrix,
    data_type: DataType,
) -> Result<(ExpressionMatrix, FilterReport)> {
    let n_before = matrix.n_features();
    let min_detected = policy::min_samples_for_feature_filter(data_type, matrix.n_samples());

    let totals = matrix.row_sums();
    let detected = matrix.detected_per_feature();
    let keep: Vec<usize> = (0..n_before)
        .filter(|&i| totals[i] > 0.0 && detected[i] >= min_detected)
        .collect();

    let filtered = matrix.subset_features(&keep)?;
    let report = FilterReport::new("features", min_detected, n_before, filtered.n_features());
    debug!(
        "Feature filter (detected in >= {} samples): {} -> {}",
        min_detected, report.n_before, report.n_after
    );

    Ok((filtered, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    #[test]
    fn test_bulk_feature_filter() {
        let rows = vec![
            vec![5.0, 3.0, 1.0, 2.0],  // detected everywhere
            vec![5.0, 3.0, 0.0, 0.0],  // detected in 2 < 3
            vec![0.0, 0.0, 0.0, 0.0],  // empty
            vec![1.0, 1.0, 1.0, 0.0],  // detected in 3
            vec![-1.0, 0.5, 0.5, 0.5], // total 0.5, detected in 3
        ];
        let matrix = ExpressionMatrix::from_rows(&rows, ids("G", 5), ids("S", 4)).unwrap();

        let (filtered, report) = filter_features(&matrix, DataType::Bulk).unwrap();
        assert_eq!(filtered.feature_ids(), &["G0", "G3", "G4"]);
        assert_eq!(report.threshold, 3);
        assert_eq!(report.n_removed, 2);
        assert_eq!(filtered.n_samples(), 4);
    }

    #[test]
    fn test_negative_total_is_dropped() {
        let rows = vec![vec![-5.0, 1.0, 1.0, 1.0], vec![1.0, 1.0, 1.0, 1.0]];
        let matrix = ExpressionMatrix::from_rows(&rows, ids("G", 2), ids("S", 4)).unwrap();
        let (filtered, _) = filter_features(&matrix, DataType::Bulk).unwrap();
        assert_eq!(filtered.feature_ids(), &["G1"]);
    }

    #[test]
    fn test_single_cell_threshold_uses_cell_count() {
        // 50 cells: threshold max(1, 0) = 1
        let mut rows = vec![vec![0.0; 50]; 2];
        rows[0][7] = 1.0;
        let matrix = ExpressionMatrix::from_rows(&rows, ids("G", 2), ids("C", 50)).unwrap();
        let (filtered, report) = filter_features(&matrix, DataType::SingleCell).unwrap();
        assert_eq!(report.threshold, 1);
        assert_eq!(filtered.n_features(), 1);
    }

    #[test]
    fn test_counts_never_grow() {
        let rows = vec![vec![1.0, 0.0, 2.0]; 4];
        let matrix = ExpressionMatrix::from_rows(&rows, ids("G", 4), ids("S", 3)).unwrap();
        let (filtered, _) = filter_features(&matrix, DataType::Bulk).unwrap();
        assert!(filtered.n_features() <= matrix.n_features());
        assert_eq!(filtered.n_features(), 0);
    }
}
