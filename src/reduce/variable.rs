//! Variable-feature selection and standardization.

use crate::normalize::NormalizedMatrix;
use nalgebra::DMatrix;
use rayon::prelude::*;

/// Unbiased (n - 1) variance of each feature across samples.
///
/// Features observed in fewer than two samples get zero variance.
pub fn feature_variances(norm: &NormalizedMatrix) -> Vec<f64> {
    let n = norm.n_samples();
    (0..norm.n_features())
        .into_par_iter()
        .map(|i| {
            if n < 2 {
                return 0.0;
            }
            let row = norm.data.row(i);
            let mean = row.sum() / n as f64;
            row.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        })
        .collect()
}

/// Indices of the `k` most variable features, most variable first.
///
/// Ties keep feature order.
pub fn top_variable_features(norm: &NormalizedMatrix, k: usize) -> Vec<usize> {
    let variances = feature_variances(norm);
    let mut indices: Vec<usize> = (0..variances.len()).collect();
    indices.sort_by(|&a, &b| {
        variances[b]
            .partial_cmp(&variances[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    indices.truncate(k);
    indices
}

/// Samples × selected-features matrix, the observation layout used for PCA.
pub fn observations(norm: &NormalizedMatrix, features: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(norm.n_samples(), features.len(), |s, f| {
        norm.data[(features[f], s)]
    })
}

/// Centre each column to zero mean and scale it to unit population variance.
///
/// Constant columns are centred only.
pub fn standardize(x: &DMatrix<f64>) -> DMatrix<f64> {
    let n = x.nrows();
    let mut out = x.clone();
    if n == 0 {
        return out;
    }
    for mut col in out.column_iter_mut() {
        let mean = col.sum() / n as f64;
        let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        let sd = var.sqrt();
        for v in col.iter_mut() {
            *v -= mean;
            if sd > 0.0 {
                *v /= sd;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn norm_from(rows: Vec<Vec<f64>>) -> NormalizedMatrix {
        let n_features = rows.len();
        let n_samples = rows[0].len();
        let data = DMatrix::from_fn(n_features, n_samples, |i, j| rows[i][j]);
        NormalizedMatrix {
            data,
            feature_ids: (0..n_features).map(|i| format!("G{}", i)).collect(),
            sample_ids: (0..n_samples).map(|j| format!("S{}", j)).collect(),
            scale_factor: 1e6,
            library_sizes: vec![1.0; n_samples],
        }
    }

    #[test]
    fn test_variances_are_unbiased() {
        let norm = norm_from(vec![vec![1.0, 2.0, 3.0, 4.0], vec![2.0, 2.0, 2.0, 2.0]]);
        let v = feature_variances(&norm);
        assert_relative_eq!(v[0], 5.0 / 3.0, epsilon = 1e-12);
        assert_eq!(v[1], 0.0);
    }

    #[test]
    fn test_top_variable_ordering_and_ties() {
        let norm = norm_from(vec![
            vec![0.0, 1.0, 0.0, 1.0],
            vec![0.0, 5.0, 0.0, 5.0],
            vec![1.0, 0.0, 1.0, 0.0],
            vec![3.0, 3.0, 3.0, 3.0],
        ]);
        // G0 and G2 have equal variance; G0 comes first.
        assert_eq!(top_variable_features(&norm, 3), vec![1, 0, 2]);
        assert_eq!(top_variable_features(&norm, 10).len(), 4);
    }

    #[test]
    fn test_observations_layout() {
        let norm = norm_from(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]);
        let x = observations(&norm, &[2, 0]);
        assert_eq!(x.shape(), (2, 2));
        assert_eq!(x[(1, 0)], 6.0);
        assert_eq!(x[(0, 1)], 1.0);
    }

    #[test]
    fn test_standardize() {
        let x = DMatrix::from_row_slice(4, 2, &[1.0, 7.0, 2.0, 7.0, 3.0, 7.0, 4.0, 7.0]);
        let z = standardize(&x);
        let col0: Vec<f64> = z.column(0).iter().cloned().collect();
        let mean: f64 = col0.iter().sum::<f64>() / 4.0;
        let var: f64 = col0.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 4.0;
        assert_relative_eq!(mean, 0.0, epsilon = 1e-12);
        assert_relative_eq!(var, 1.0, epsilon = 1e-12);
        assert!(z.column(1).iter().all(|&v| v == 0.0));
    }
}
