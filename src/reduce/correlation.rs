//! Sample-to-sample Pearson correlation.

use crate::data::SampleCorrelation;
use crate::normalize::NormalizedMatrix;
use crate::reduce::variable::observations;
use nalgebra::DMatrix;

/// Pearson correlation between the rows of `x` (observations × features).
///
/// The diagonal is 1; a constant row correlates 0 with every other row.
pub fn pearson_correlation(x: &DMatrix<f64>) -> Vec<Vec<f64>> {
    let (n, p) = x.shape();
    let centered: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            let row = x.row(i);
            let mean = if p > 0 { row.sum() / p as f64 } else { 0.0 };
            row.iter().map(|v| v - mean).collect()
        })
        .collect();
    let norms: Vec<f64> = centered
        .iter()
        .map(|r| r.iter().map(|v| v * v).sum::<f64>().sqrt())
        .collect();

    let mut corr = vec![vec![0.0; n]; n];
    for i in 0..n {
        corr[i][i] = 1.0;
        for j in (i + 1)..n {
            let r = if norms[i] > 0.0 && norms[j] > 0.0 {
                let dot: f64 = centered[i].iter().zip(&centered[j]).map(|(a, b)| a * b).sum();
                (dot / (norms[i] * norms[j])).clamp(-1.0, 1.0)
            } else {
                0.0
            };
            corr[i][j] = r;
            corr[j][i] = r;
        }
    }
    corr
}

/// Correlation between samples over the given features.
pub fn sample_correlation(norm: &NormalizedMatrix, features: &[usize]) -> SampleCorrelation {
    SampleCorrelation {
        matrix: pearson_correlation(&observations(norm, features)),
        labels: norm.sample_ids.clone(),
    }
}
