//! K-means clustering with k-means++ seeding.

use crate::data::GroupAssignment;
use crate::error::{AnalysisError, Result};
use crate::group::Grouping;
use log::{debug, warn};
use nalgebra::DMatrix;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for k-means clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansConfig {
    /// Number of clusters.
    pub n_clusters: usize,
    /// Number of independently seeded runs; the lowest inertia wins.
    pub n_init: usize,
    /// Maximum Lloyd iterations per run.
    pub max_iter: usize,
    /// Convergence threshold on the largest centroid shift.
    pub tolerance: f64,
    /// Base random seed.
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            n_clusters: 2,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
            seed: 42,
        }
    }
}

/// Result of k-means clustering.
#[derive(Debug, Clone)]
pub struct KMeansResult {
    /// Cluster label for each point, numbered by first appearance.
    pub labels: Vec<usize>,
    /// Centroids (clusters × dimensions), in label order.
    pub centroids: DMatrix<f64>,
    /// Sum of squared distances to the nearest centroid.
    pub inertia: f64,
    /// Iterations run by the winning initialization.
    pub n_iter: usize,
}

/// Cluster the rows of `x`.
pub fn kmeans(x: &DMatrix<f64>, config: &KMeansConfig) -> Result<KMeansResult> {
    let (n, dim) = x.shape();
    let k = config.n_clusters;

    if n == 0 || dim == 0 {
        return Err(AnalysisError::EmptyData("Cannot cluster empty data".to_string()));
    }
    if k == 0 || k > n {
        return Err(AnalysisError::InvalidParameter(format!(
            "n_clusters ({}) must be in [1, {}]",
            k, n
        )));
    }

    let points: Vec<Vec<f64>> = (0..n).map(|i| x.row(i).iter().cloned().collect()).collect();

    let runs: Vec<(f64, usize, Vec<usize>, Vec<Vec<f64>>)> = (0..config.n_init.max(1))
        .into_par_iter()
        .map(|run| {
            let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(run as u64));
            let init = kmeans_plus_plus(&points, k, &mut rng);
            let (labels, centroids, n_iter) = lloyd(&points, init, config);
            (inertia(&points, &labels, &centroids), n_iter, labels, centroids)
        })
        .collect();

    let best = runs
        .into_iter()
        .fold(None, |best: Option<(f64, usize, Vec<usize>, Vec<Vec<f64>>)>, run| match best {
            Some(b) if b.0 <= run.0 => Some(b),
            _ => Some(run),
        })
        .ok_or_else(|| AnalysisError::Pipeline("k-means produced no runs".to_string()))?;
    let (inertia, n_iter, labels, centroids) = best;

    let (labels, centroids) = relabel(labels, centroids);
    Ok(KMeansResult {
        labels,
        centroids: DMatrix::from_fn(k, dim, |c, d| centroids[c][d]),
        inertia,
        n_iter,
    })
}

/// Cluster cells on their leading principal components.
///
/// A degenerate embedding (non-finite coordinates, or fewer distinct points
/// than clusters) yields [`Grouping::Skipped`].
pub fn cluster_cells(scores: &DMatrix<f64>, cell_ids: &[String], config: &KMeansConfig) -> Grouping {
    if scores.iter().any(|v| !v.is_finite()) {
        let reason = "embedding contains non-finite coordinates".to_string();
        warn!("Clustering skipped: {}", reason);
        return Grouping::Skipped { reason };
    }

    let n_distinct = count_distinct_rows(scores);
    if n_distinct < config.n_clusters {
        let reason = format!(
            "only {} distinct points for {} clusters",
            n_distinct, config.n_clusters
        );
        warn!("Clustering skipped: {}", reason);
        return Grouping::Skipped { reason };
    }

    match kmeans(scores, config) {
        Ok(result) => {
            debug!(
                "k-means: k = {}, inertia = {:.4}, {} iterations",
                config.n_clusters, result.inertia, result.n_iter
            );
            let assignment = GroupAssignment::from_clusters(cell_ids, &result.labels);
            Grouping::Clustered {
                clusters: result.labels,
                n_clusters: config.n_clusters,
                assignment,
            }
        }
        Err(e) => {
            warn!("Clustering skipped: {}", e);
            Grouping::Skipped {
                reason: e.to_string(),
            }
        }
    }
}

fn count_distinct_rows(x: &DMatrix<f64>) -> usize {
    let mut rows: Vec<Vec<u64>> = (0..x.nrows())
        .map(|i| x.row(i).iter().map(|v| (v + 0.0).to_bits()).collect())
        .collect();
    rows.sort();
    rows.dedup();
    rows.len()
}

fn sq_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    centroids
        .iter()
        .enumerate()
        .map(|(c, cent)| (c, sq_euclidean(point, cent)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

fn kmeans_plus_plus(points: &[Vec<f64>], k: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut centroids = vec![points[rng.gen_range(0..n)].clone()];
    let mut dists: Vec<f64> = points
        .iter()
        .map(|p| sq_euclidean(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = dists.iter().sum();
        let chosen = if total > 0.0 {
            let threshold = rng.gen::<f64>() * total;
            let mut cumulative = 0.0;
            dists
                .iter()
                .position(|&d| {
                    cumulative += d;
                    cumulative >= threshold && d > 0.0
                })
                .unwrap_or(n - 1)
        } else {
            centroids.len() % n
        };
        let next = points[chosen].clone();
        for (d, p) in dists.iter_mut().zip(points) {
            *d = d.min(sq_euclidean(p, &next));
        }
        centroids.push(next);
    }
    centroids
}

fn lloyd(
    points: &[Vec<f64>],
    mut centroids: Vec<Vec<f64>>,
    config: &KMeansConfig,
) -> (Vec<usize>, Vec<Vec<f64>>, usize) {
    let k = centroids.len();
    let dim = points[0].len();
    let mut labels = vec![0usize; points.len()];
    let mut n_iter = 0;

    for _ in 0..config.max_iter {
        n_iter += 1;
        for (label, p) in labels.iter_mut().zip(points) {
            *label = nearest(p, &centroids).0;
        }

        let mut sums = vec![vec![0.0; dim]; k];
        let mut counts = vec![0usize; k];
        for (&c, p) in labels.iter().zip(points) {
            counts[c] += 1;
            for (s, v) in sums[c].iter_mut().zip(p) {
                *s += v;
            }
        }

        let mut max_shift = 0.0_f64;
        for c in 0..k {
            // Empty clusters keep their centroid.
            if counts[c] == 0 {
                continue;
            }
            let updated: Vec<f64> = sums[c].iter().map(|s| s / counts[c] as f64).collect();
            max_shift = max_shift.max(sq_euclidean(&updated, &centroids[c]).sqrt());
            centroids[c] = updated;
        }

        if max_shift < config.tolerance {
            break;
        }
    }

    for (label, p) in labels.iter_mut().zip(points) {
        *label = nearest(p, &centroids).0;
    }
    (labels, centroids, n_iter)
}

fn inertia(points: &[Vec<f64>], labels: &[usize], centroids: &[Vec<f64>]) -> f64 {
    points
        .iter()
        .zip(labels)
        .map(|(p, &c)| sq_euclidean(p, &centroids[c]))
        .sum()
}

/// Renumber clusters in order of first appearance.
fn relabel(labels: Vec<usize>, centroids: Vec<Vec<f64>>) -> (Vec<usize>, Vec<Vec<f64>>) {
    let k = centroids.len();
    let mut mapping = vec![usize::MAX; k];
    let mut next = 0;
    for &l in &labels {
        if mapping[l] == usize::MAX {
            mapping[l] = next;
            next += 1;
        }
    }
    for m in mapping.iter_mut() {
        if *m == usize::MAX {
            *m = next;
            next += 1;
        }
    }

    let mut reordered = vec![Vec::new(); k];
    for (old, cent) in centroids.into_iter().enumerate() {
        reordered[mapping[old]] = cent;
    }
    (labels.into_iter().map(|l| mapping[l]).collect(), reordered)
}
