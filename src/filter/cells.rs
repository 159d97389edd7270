//! Cell filtering by number of detected features.

use crate::data::ExpressionMatrix;
use crate::error::Result;
use crate::filter::FilterReport;
use crate::policy;
use log::debug;

/// Drop cells with fewer detected features than `min(200, 5% of features)`.
pub fn filter_cells(matrix: &ExpressionMatrix) -> Result<(ExpressionMatrix, FilterReport)> {
    let n_before = matrix.n_samples();
    let min_detected = policy::min_features_for_cell_filter(matrix.n_features());

    let keep: Vec<usize> = matrix
        .detected_per_sample()
        .into_iter()
        .enumerate()
        .filter(|&(_, n)| n >= min_detected)
        .map(|(j, _)| j)
        .collect();

    let filtered = matrix.subset_samples(&keep)?;
    let report = FilterReport::new("cells", min_detected, n_before, filtered.n_samples());
    debug!(
        "Cell filter (>= {} detected features): {} -> {}",
        min_detected, report.n_before, report.n_after
    );

    Ok((filtered, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_cells_are_dropped() {
        // 40 features -> threshold 2
        let n_features = 40;
        let mut rows = vec![vec![0.0; 3]; n_features];
        rows[0][0] = 1.0; // cell 0: 1 feature
        rows[0][1] = 1.0; // cell 1: 2 features
        rows[1][1] = 4.0;
        for row in rows.iter_mut() {
            row[2] = 1.0; // cell 2: all features
        }
        let matrix = ExpressionMatrix::from_rows(
            &rows,
            (0..n_features).map(|i| format!("G{}", i)).collect(),
            vec!["C0".into(), "C1".into(), "C2".into()],
        )
        .unwrap();

        let (filtered, report) = filter_cells(&matrix).unwrap();
        assert_eq!(report.threshold, 2);
        assert_eq!(filtered.sample_ids(), &["C1", "C2"]);
        assert_eq!(filtered.n_features(), n_features);
    }
}
