//! Library-size scaling with a `log1p` transform.
//!
//! Each sample's values are divided by the sample total, multiplied by a
//! target scale (1e6 counts per million for bulk, 1e4 for single-cell) and
//! transformed with `ln(1 + x)`.

use crate::data::ExpressionMatrix;
use crate::detect::DataType;
use crate::error::{AnalysisError, Result};
use crate::policy;
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Log-normalized expression values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedMatrix {
    /// The normalized data (features × samples).
    #[serde(skip)]
    pub data: DMatrix<f64>,
    /// Feature identifiers.
    pub feature_ids: Vec<String>,
    /// Sample identifiers.
    pub sample_ids: Vec<String>,
    /// Target total per sample before the log transform.
    pub scale_factor: f64,
    /// Total signal per sample before normalization.
    pub library_sizes: Vec<f64>,
}

impl NormalizedMatrix {
    /// Get the normalized value for a feature and sample.
    pub fn get(&self, feature: usize, sample: usize) -> f64 {
        self.data[(feature, sample)]
    }

    /// Number of features.
    pub fn n_features(&self) -> usize {
        self.data.nrows()
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Values of one feature at the given sample indices.
    pub fn row_at(&self, feature: usize, samples: &[usize]) -> Vec<f64> {
        samples.iter().map(|&j| self.data[(feature, j)]).collect()
    }

    /// Map from feature identifier to row index.
    pub fn feature_index(&self) -> HashMap<&str, usize> {
        self.feature_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect()
    }

    /// Per-sample totals after undoing the log transform.
    pub fn scaled_totals(&self) -> Vec<f64> {
        (0..self.n_samples())
            .map(|j| self.data.column(j).iter().map(|v| v.exp_m1()).sum())
            .collect()
    }
}

/// Normalize a matrix by library size and log-transform it.
///
/// Samples with a zero total are divided by one, so their values stay zero
/// instead of becoming NaN or infinite.
pub fn norm_library_size(matrix: &ExpressionMatrix, scale_factor: f64) -> Result<NormalizedMatrix> {
    let n_features = matrix.n_features();
    let n_samples = matrix.n_samples();

    if n_features == 0 || n_samples == 0 {
        return Err(AnalysisError::EmptyData(
            "Cannot normalize an empty matrix".to_string(),
        ));
    }

    if scale_factor <= 0.0 {
        return Err(AnalysisError::InvalidParameter(
            "Scale factor must be positive".to_string(),
        ));
    }

    let library_sizes = matrix.col_sums();
    let divisors: Vec<f64> = library_sizes
        .iter()
        .map(|&s| if s == 0.0 { 1.0 } else { s })
        .collect();

    let dense = matrix.to_dense();
    let normalized_cols: Vec<Vec<f64>> = (0..n_samples)
        .into_par_iter()
        .map(|j| {
            dense
                .column(j)
                .iter()
                .map(|&v| (v / divisors[j] * scale_factor).ln_1p())
                .collect()
        })
        .collect();

    let mut data = DMatrix::zeros(n_features, n_samples);
    for (j, col) in normalized_cols.iter().enumerate() {
        for (i, &val) in col.iter().enumerate() {
            data[(i, j)] = val;
        }
    }

    Ok(NormalizedMatrix {
        data,
        feature_ids: matrix.feature_ids().to_vec(),
        sample_ids: matrix.sample_ids().to_vec(),
        scale_factor,
        library_sizes,
    })
}

/// Normalize with the scale target of a data type.
pub fn normalize_for(matrix: &ExpressionMatrix, data_type: DataType) -> Result<NormalizedMatrix> {
    norm_library_size(matrix, policy::normalization_scale(data_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn create_test_matrix() -> ExpressionMatrix {
        let rows = vec![
            vec![10.0, 0.0, 100.0],
            vec![30.0, 0.0, 300.0],
            vec![60.0, 0.0, 600.0],
        ];
        ExpressionMatrix::from_rows(
            &rows,
            vec!["G1".into(), "G2".into(), "G3".into()],
            vec!["S1".into(), "S2".into(), "S3".into()],
        )
        .unwrap()
    }

    #[test]
    fn test_scaled_totals_reach_target() {
        let norm = norm_library_size(&create_test_matrix(), 1e6).unwrap();
        let totals = norm.scaled_totals();
        assert_relative_eq!(totals[0], 1e6, max_relative = 1e-9);
        assert_relative_eq!(totals[2], 1e6, max_relative = 1e-9);
    }

    #[test]
    fn test_zero_sample_stays_zero() {
        let norm = norm_library_size(&create_test_matrix(), 1e4).unwrap();
        assert_eq!(norm.library_sizes[1], 0.0);
        for i in 0..3 {
            assert_eq!(norm.get(i, 1), 0.0);
        }
        assert!(norm.data.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_log1p_values() {
        let norm = normalize_for(&create_test_matrix(), DataType::SingleCell).unwrap();
        assert_relative_eq!(norm.get(0, 0), (0.1f64 * 1e4).ln_1p(), epsilon = 1e-10);
        // Same proportions give the same normalized values.
        assert_relative_eq!(norm.get(2, 0), norm.get(2, 2), epsilon = 1e-10);
        assert_eq!(norm.scale_factor, 1e4);
    }

    #[test]
    fn test_row_at() {
        let norm = norm_library_size(&create_test_matrix(), 1e6).unwrap();
        let values = norm.row_at(1, &[2, 0]);
        assert_eq!(values.len(), 2);
        assert_relative_eq!(values[0], values[1], epsilon = 1e-10);
        assert_eq!(norm.feature_index()["G3"], 2);
    }

    #[test]
    fn test_empty_matrix_rejected() {
        let empty = ExpressionMatrix::from_rows(&[], vec![], vec!["S1".into()]).unwrap();
        assert!(norm_library_size(&empty, 1e6).is_err());
    }
}
