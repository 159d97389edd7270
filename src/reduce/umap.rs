//! Two-dimensional neighbour-graph embedding (UMAP).
//!
//! Builds a k-nearest-neighbour graph over the leading principal components,
//! converts it to a symmetric fuzzy graph, and lays it out in 2-D by
//! stochastic gradient descent with negative sampling. The layout starts from
//! the first two principal components.

use crate::error::{AnalysisError, Result};
use crate::outcome::Outcome;
use crate::reduce::Pca;
use log::{debug, warn};
use nalgebra::DMatrix;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Computes a 2-D embedding of observations (rows of `x`).
pub trait Embedder: Send + Sync {
    /// Embed the rows of `x` using `n_neighbors` nearest neighbours.
    fn embed(&self, x: &DMatrix<f64>, n_neighbors: usize) -> Result<Vec<[f64; 2]>>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Layout parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UmapConfig {
    /// Minimum distance between points in the embedding.
    pub min_dist: f64,
    /// Effective scale of embedded points.
    pub spread: f64,
    /// Initial SGD learning rate.
    pub learning_rate: f64,
    /// Number of optimization epochs.
    pub n_epochs: usize,
    /// Negative samples per positive edge.
    pub negative_sample_rate: usize,
    /// Random seed.
    pub seed: u64,
    /// Largest input embedded; beyond it the exact neighbour search is
    /// refused and the caller falls back.
    pub max_observations: usize,
}

impl Default for UmapConfig {
    fn default() -> Self {
        Self {
            min_dist: 0.1,
            spread: 1.0,
            learning_rate: 1.0,
            n_epochs: 200,
            negative_sample_rate: 5,
            seed: 42,
            max_observations: 20_000,
        }
    }
}

/// Default [`Embedder`].
#[derive(Debug, Clone, Default)]
pub struct Umap {
    config: UmapConfig,
}

impl Umap {
    /// Create an embedder with the given configuration.
    pub fn new(config: UmapConfig) -> Self {
        Self { config }
    }

    /// Layout parameters.
    pub fn config(&self) -> &UmapConfig {
        &self.config
    }
}

impl Embedder for Umap {
    fn embed(&self, x: &DMatrix<f64>, n_neighbors: usize) -> Result<Vec<[f64; 2]>> {
        let n = x.nrows();
        if n < 3 {
            return Err(AnalysisError::Embedding(format!(
                "need at least 3 observations, got {}",
                n
            )));
        }
        if n > self.config.max_observations {
            return Err(AnalysisError::Embedding(format!(
                "{} observations exceed the neighbour-graph limit of {}",
                n, self.config.max_observations
            )));
        }
        if x.ncols() == 0 {
            return Err(AnalysisError::Embedding("input has no dimensions".to_string()));
        }
        if n_neighbors < 2 || n_neighbors >= n {
            return Err(AnalysisError::Embedding(format!(
                "n_neighbors ({}) must be in [2, {})",
                n_neighbors, n
            )));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::Embedding(
                "input contains non-finite values".to_string(),
            ));
        }

        let (knn_indices, knn_dists) = knn_graph(x, n_neighbors);
        let edges = fuzzy_graph(&knn_indices, &knn_dists);
        let (a, b) = fit_ab(self.config.min_dist, self.config.spread);
        debug!(
            "UMAP: {} points, k = {}, {} edges, a = {:.4}, b = {:.4}",
            n,
            n_neighbors,
            edges.len(),
            a,
            b
        );

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut embedding = initialize(x, &mut rng);
        optimize(&mut embedding, &edges, a, b, &self.config, &mut rng);

        if embedding.iter().any(|p| !p[0].is_finite() || !p[1].is_finite()) {
            return Err(AnalysisError::Embedding(
                "layout diverged to non-finite coordinates".to_string(),
            ));
        }
        Ok(embedding)
    }

    fn name(&self) -> &str {
        "umap"
    }
}

/// Embed the leading `n_dims` components, falling back to PC1/PC2 on failure.
pub fn embed_or_fallback(
    embedder: &dyn Embedder,
    pca: &Pca,
    n_dims: usize,
    n_neighbors: usize,
) -> Outcome<Vec<[f64; 2]>> {
    let x = pca.leading(n_dims);
    match embedder.embed(&x, n_neighbors) {
        Ok(coords) => Outcome::Computed(coords),
        Err(e) => {
            warn!(
                "{} embedding failed ({}); using the first two principal components",
                embedder.name(),
                e
            );
            Outcome::Fallback {
                value: pca.coordinates(),
                reason: e.to_string(),
            }
        }
    }
}

/// Symmetrized fuzzy edge.
#[derive(Debug, Clone)]
struct Edge {
    i: usize,
    j: usize,
    weight: f64,
}

/// Brute-force Euclidean kNN, excluding self. `k` must be below `x.nrows()`.
fn knn_graph(x: &DMatrix<f64>, k: usize) -> (Vec<Vec<usize>>, Vec<Vec<f64>>) {
    let n = x.nrows();
    let dim = x.ncols();
    // Row-major copy so each observation is one contiguous slice.
    let flat = x.transpose();
    let rows = flat.as_slice();
    let row = move |i: usize| &rows[i * dim..(i + 1) * dim];
    let by_distance = |a: &(usize, f64), b: &(usize, f64)| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    };

    let results: Vec<(Vec<usize>, Vec<f64>)> = (0..n)
        .into_par_iter()
        .map(|i| {
            let ri = row(i);
            let mut dists: Vec<(usize, f64)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| (j, squared_distance(ri, row(j))))
                .collect();
            dists.select_nth_unstable_by(k - 1, by_distance);
            dists.truncate(k);
            dists.sort_unstable_by(by_distance);
            dists.into_iter().map(|(j, d)| (j, d.sqrt())).unzip()
        })
        .collect();
    results.into_iter().unzip()
}

#[inline]
fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Bandwidth per point so that the membership strengths sum to `log2(k)`.
fn smooth_distances(dists: &[f64]) -> (f64, f64) {
    let target = (dists.len() as f64).log2();
    let rho = dists.iter().cloned().find(|&d| d > 0.0).unwrap_or(0.0);

    let mut lo = 0.0_f64;
    let mut hi = f64::INFINITY;
    let mut sigma = 1.0;
    for _ in 0..64 {
        let sum: f64 = dists
            .iter()
            .map(|&d| (-((d - rho).max(0.0)) / sigma).exp())
            .sum();
        if (sum - target).abs() < 1e-5 {
            break;
        }
        if sum > target {
            hi = sigma;
            sigma = (lo + hi) / 2.0;
        } else {
            lo = sigma;
            sigma = if hi.is_infinite() { sigma * 2.0 } else { (lo + hi) / 2.0 };
        }
    }
    (rho, sigma.max(1e-3 * mean(dists)).max(f64::MIN_POSITIVE))
}

fn mean(v: &[f64]) -> f64 {
    if v.is_empty() {
        0.0
    } else {
        v.iter().sum::<f64>() / v.len() as f64
    }
}

/// Directed memberships, symmetrized as `w_ij + w_ji - w_ij * w_ji`.
fn fuzzy_graph(knn_indices: &[Vec<usize>], knn_dists: &[Vec<f64>]) -> Vec<Edge> {
    let mut pairs: BTreeMap<(usize, usize), (f64, f64)> = BTreeMap::new();

    for (i, (neighbors, dists)) in knn_indices.iter().zip(knn_dists).enumerate() {
        let (rho, sigma) = smooth_distances(dists);
        for (&j, &d) in neighbors.iter().zip(dists) {
            let w = (-((d - rho).max(0.0)) / sigma).exp();
            let entry = pairs.entry((i.min(j), i.max(j))).or_insert((0.0, 0.0));
            if i < j {
                entry.0 = w;
            } else {
                entry.1 = w;
            }
        }
    }

    pairs
        .into_iter()
        .map(|((i, j), (w_ij, w_ji))| Edge {
            i,
            j,
            weight: w_ij + w_ji - w_ij * w_ji,
        })
        .filter(|e| e.weight > 0.0)
        .collect()
}

/// Fit `a`, `b` of the curve `1 / (1 + a d^(2b))` to the target membership.
fn fit_ab(min_dist: f64, spread: f64) -> (f64, f64) {
    if (min_dist - 0.1).abs() < 1e-10 && (spread - 1.0).abs() < 1e-10 {
        return (1.929, 0.7915);
    }

    let n_points = 300;
    let max_d = 3.0 * spread;
    let (mut a, mut b) = (1.0_f64, 1.0_f64);

    for _ in 0..100 {
        let (mut jj00, mut jj01, mut jj11, mut jr0, mut jr1) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for k in 0..n_points {
            let d = (k as f64 + 0.5) * max_d / n_points as f64;
            let target = if d <= min_dist {
                1.0
            } else {
                (-(d - min_dist) / spread).exp()
            };
            let d2b = d.powf(2.0 * b);
            let denom = 1.0 + a * d2b;
            let residual = 1.0 / denom - target;
            let da = -d2b / (denom * denom);
            let db = -a * d2b * 2.0 * d.ln() / (denom * denom);
            jj00 += da * da;
            jj01 += da * db;
            jj11 += db * db;
            jr0 += da * residual;
            jr1 += db * residual;
        }
        let det = jj00 * jj11 - jj01 * jj01;
        if det.abs() < 1e-20 {
            break;
        }
        let step_a = -(jj11 * jr0 - jj01 * jr1) / det;
        let step_b = -(jj00 * jr1 - jj01 * jr0) / det;
        a = (a + step_a).max(1e-3);
        b = (b + step_b).max(1e-3);
        if step_a.abs() < 1e-8 && step_b.abs() < 1e-8 {
            break;
        }
    }
    (a, b)
}

/// Start from the first two input dimensions, scaled to a max magnitude of 10.
fn initialize(x: &DMatrix<f64>, rng: &mut ChaCha8Rng) -> Vec<[f64; 2]> {
    let mut embedding: Vec<[f64; 2]> = (0..x.nrows())
        .map(|i| {
            let mut p = [0.0; 2];
            for (d, v) in p.iter_mut().enumerate() {
                *v = if d < x.ncols() {
                    x[(i, d)]
                } else {
                    rng.gen_range(-0.005..0.005)
                };
            }
            p
        })
        .collect();

    let max_abs = embedding
        .iter()
        .flat_map(|p| p.iter())
        .fold(0.0_f64, |m, v| m.max(v.abs()));
    if max_abs > 0.0 {
        let scale = 10.0 / max_abs;
        for p in embedding.iter_mut() {
            p[0] *= scale;
            p[1] *= scale;
        }
    }
    embedding
}

const GRADIENT_CLIP: f64 = 4.0;

fn optimize(
    embedding: &mut [[f64; 2]],
    edges: &[Edge],
    a: f64,
    b: f64,
    config: &UmapConfig,
    rng: &mut ChaCha8Rng,
) {
    let n = embedding.len();
    let n_epochs = config.n_epochs;
    let max_weight = edges.iter().fold(0.0_f64, |m, e| m.max(e.weight));
    if edges.is_empty() || n_epochs == 0 || max_weight <= 0.0 {
        return;
    }

    let epochs_per_sample: Vec<f64> = edges.iter().map(|e| max_weight / e.weight).collect();
    let mut next_sample = epochs_per_sample.clone();

    for epoch in 0..n_epochs {
        let lr = config.learning_rate * (1.0 - epoch as f64 / n_epochs as f64);

        for (idx, edge) in edges.iter().enumerate() {
            if next_sample[idx] > epoch as f64 {
                continue;
            }
            let (i, j) = (edge.i, edge.j);

            let diff = [
                embedding[i][0] - embedding[j][0],
                embedding[i][1] - embedding[j][1],
            ];
            let dist_sq = (diff[0] * diff[0] + diff[1] * diff[1]).max(1e-10);
            let coeff = -2.0 * a * b * dist_sq.powf(b - 1.0) / (1.0 + a * dist_sq.powf(b));
            for d in 0..2 {
                let grad = (coeff * diff[d]).clamp(-GRADIENT_CLIP, GRADIENT_CLIP);
                embedding[i][d] += lr * grad;
                embedding[j][d] -= lr * grad;
            }

            for _ in 0..config.negative_sample_rate {
                let neg = rng.gen_range(0..n);
                if neg == i {
                    continue;
                }
                let diff = [
                    embedding[i][0] - embedding[neg][0],
                    embedding[i][1] - embedding[neg][1],
                ];
                let dist_sq = (diff[0] * diff[0] + diff[1] * diff[1]).max(1e-10);
                let coeff = 2.0 * b / ((0.001 + dist_sq) * (1.0 + a * dist_sq.powf(b)));
                for d in 0..2 {
                    let grad = (coeff * diff[d]).clamp(-GRADIENT_CLIP, GRADIENT_CLIP);
                    embedding[i][d] += lr * grad;
                }
            }

            next_sample[idx] += epochs_per_sample[idx];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> DMatrix<f64> {
        DMatrix::from_fn(20, 3, |i, d| {
            let offset = if i < 10 { 0.0 } else { 50.0 };
            offset + (i % 10) as f64 * 0.1 + d as f64 * 0.05
        })
    }

    fn centroid(points: &[[f64; 2]]) -> [f64; 2] {
        let n = points.len() as f64;
        [
            points.iter().map(|p| p[0]).sum::<f64>() / n,
            points.iter().map(|p| p[1]).sum::<f64>() / n,
        ]
    }

    #[test]
    fn test_blobs_stay_separated() {
        let umap = Umap::new(UmapConfig {
            n_epochs: 100,
            ..Default::default()
        });
        let coords = umap.embed(&two_blobs(), 5).unwrap();
        assert_eq!(coords.len(), 20);
        assert!(coords.iter().all(|p| p[0].is_finite() && p[1].is_finite()));

        let ca = centroid(&coords[..10]);
        let cb = centroid(&coords[10..]);
        let between = ((ca[0] - cb[0]).powi(2) + (ca[1] - cb[1]).powi(2)).sqrt();
        assert!(between > 1.0, "centroid distance {}", between);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let umap = Umap::default();
        let a = umap.embed(&two_blobs(), 5).unwrap();
        let b = umap.embed(&two_blobs(), 5).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_neighbors_is_an_error() {
        let umap = Umap::default();
        assert!(umap.embed(&two_blobs(), 20).is_err());
        assert!(umap.embed(&two_blobs(), 1).is_err());
    }

    #[test]
    fn test_knn_matches_full_sort() {
        let x = DMatrix::from_fn(40, 4, |i, d| ((i * 37 + d * 11) % 17) as f64 * 0.3 + d as f64);
        let (indices, dists) = knn_graph(&x, 6);
        for i in 0..40 {
            let mut expected: Vec<(usize, f64)> = (0..40)
                .filter(|&j| j != i)
                .map(|j| (j, (x.row(i) - x.row(j)).norm()))
                .collect();
            expected.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then(a.0.cmp(&b.0)));
            let expected_dists: Vec<f64> = expected[..6].iter().map(|p| p.1).collect();
            for (got, want) in dists[i].iter().zip(&expected_dists) {
                assert!((got - want).abs() < 1e-12);
            }
            assert_eq!(indices[i].len(), 6);
            assert!(!indices[i].contains(&i));
        }
    }

    #[test]
    fn test_large_input_is_refused() {
        let umap = Umap::new(UmapConfig {
            max_observations: 15,
            ..Default::default()
        });
        let err = umap.embed(&two_blobs(), 5).unwrap_err();
        assert!(matches!(err, AnalysisError::Embedding(_)));

        let pca = Pca {
            scores: two_blobs(),
            variance_ratio: vec![0.9, 0.05, 0.05],
        };
        let outcome = embed_or_fallback(&umap, &pca, 3, 5);
        assert!(outcome.is_fallback());
        assert_eq!(outcome.value()[0], [two_blobs()[(0, 0)], two_blobs()[(0, 1)]]);
    }

    #[test]
    fn test_ab_fit_close_to_defaults() {
        let (a, b) = fit_ab(0.1, 1.0);
        assert_eq!((a, b), (1.929, 0.7915));
        let (a, b) = fit_ab(0.5, 1.0);
        assert!(a > 0.0 && b > 0.0);
    }

    struct Failing;

    impl Embedder for Failing {
        fn embed(&self, _: &DMatrix<f64>, _: usize) -> Result<Vec<[f64; 2]>> {
            Err(AnalysisError::Embedding("boom".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn test_failure_falls_back_to_pca() {
        let pca = Pca {
            scores: DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            variance_ratio: vec![0.7, 0.3],
        };
        let outcome = embed_or_fallback(&Failing, &pca, 30, 2);
        assert!(outcome.is_fallback());
        assert_eq!(outcome.reason(), Some("Embedding failed: boom"));
        assert_eq!(outcome.value()[2], [5.0, 6.0]);
    }
}
