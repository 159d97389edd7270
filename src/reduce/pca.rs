//! Principal component analysis by symmetric eigendecomposition.
//!
//! The input is an already standardized observations × features matrix.
//! Whichever of the Gram matrix (`X Xᵀ`) and the scatter matrix (`Xᵀ X`) is
//! smaller is decomposed; both share the same non-zero eigenvalues.

use crate::data::EmbeddingResult;
use crate::error::{AnalysisError, Result};
use nalgebra::{DMatrix, SymmetricEigen};

/// PCA scores and explained variance.
#[derive(Debug, Clone)]
pub struct Pca {
    /// Per-observation scores (observations × components).
    pub scores: DMatrix<f64>,
    /// Proportion of total variance explained per component, descending.
    pub variance_ratio: Vec<f64>,
}

impl Pca {
    /// Number of computed components.
    pub fn n_components(&self) -> usize {
        self.scores.ncols()
    }

    /// Scores restricted to the first `k` components.
    pub fn leading(&self, k: usize) -> DMatrix<f64> {
        let k = k.min(self.n_components());
        self.scores.columns(0, k).into_owned()
    }

    /// First two components per observation.
    pub fn coordinates(&self) -> Vec<[f64; 2]> {
        let pc = |i: usize, c: usize| {
            if c < self.scores.ncols() {
                self.scores[(i, c)]
            } else {
                0.0
            }
        };
        (0..self.scores.nrows())
            .map(|i| [pc(i, 0), pc(i, 1)])
            .collect()
    }

    /// Plotting coordinates plus variance ratios.
    pub fn to_embedding(&self) -> EmbeddingResult {
        EmbeddingResult {
            coordinates: self.coordinates(),
            variance_ratio: self.variance_ratio.clone(),
        }
    }
}

/// Compute the first `n_components` principal components of `x`.
///
/// `x` must be column-centred. Components beyond the rank of `x` have zero
/// scores and zero explained variance. Each component's sign is chosen so
/// that its largest-magnitude score is positive.
pub fn pca(x: &DMatrix<f64>, n_components: usize) -> Result<Pca> {
    let (n, p) = x.shape();
    if n == 0 || p == 0 {
        return Err(AnalysisError::EmptyData(
            "Cannot run PCA on an empty matrix".to_string(),
        ));
    }
    if n_components == 0 {
        return Err(AnalysisError::InvalidParameter(
            "Number of components must be positive".to_string(),
        ));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(AnalysisError::Numerical(
            "PCA input contains non-finite values".to_string(),
        ));
    }

    let total_ss: f64 = x.iter().map(|v| v * v).sum();
    let use_gram = n <= p;
    let cross = if use_gram {
        x * x.transpose()
    } else {
        x.transpose() * x
    };

    let eig = SymmetricEigen::try_new(cross, f64::EPSILON, 0).ok_or_else(|| {
        AnalysisError::Numerical("Eigendecomposition did not converge".to_string())
    })?;

    let mut order: Vec<usize> = (0..eig.eigenvalues.len()).collect();
    order.sort_by(|&a, &b| {
        eig.eigenvalues[b]
            .partial_cmp(&eig.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut scores = DMatrix::zeros(n, n_components);
    let mut variance_ratio = vec![0.0; n_components];

    for (c, &k) in order.iter().take(n_components).enumerate() {
        let lambda = eig.eigenvalues[k].max(0.0);
        let vector = eig.eigenvectors.column(k);
        let component = if use_gram {
            vector * lambda.sqrt()
        } else {
            x * vector
        };

        let sign = component
            .iter()
            .cloned()
            .fold(0.0_f64, |best, v| if v.abs() > best.abs() { v } else { best })
            .signum();
        let sign = if sign == 0.0 { 1.0 } else { sign };

        scores.set_column(c, &(component * sign));
        if total_ss > 0.0 {
            variance_ratio[c] = lambda / total_ss;
        }
    }

    Ok(Pca {
        scores,
        variance_ratio,
    })
}
