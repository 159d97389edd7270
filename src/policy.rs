//! Adaptive thresholds used by the filtering, reduction and grouping stages.
//!
//! Each threshold depends only on the data type and the dataset shape, so
//! every rule is a plain function that can be tested on its own.

use crate::detect::DataType;

/// Minimum number of features that must survive filtering.
pub const MIN_FEATURES_AFTER_FILTER: usize = 10;

/// Minimum number of cells that must survive single-cell filtering.
pub const MIN_CELLS_AFTER_FILTER: usize = 10;

/// Minimum number of samples a bulk matrix needs after filtering.
pub const MIN_BULK_SAMPLES: usize = 2;

/// Minimum members per group for a two-group comparison.
pub const MIN_GROUP_SIZE: usize = 2;

/// Counts-per-million scale for bulk normalization.
pub const BULK_SCALE: f64 = 1e6;

/// Per-cell scale for single-cell normalization.
pub const SINGLE_CELL_SCALE: f64 = 1e4;

const BULK_VARIABLE_FEATURES: usize = 5000;
const SINGLE_CELL_VARIABLE_FEATURES: usize = 2000;
const BULK_MAX_COMPONENTS: usize = 10;
const SINGLE_CELL_MAX_COMPONENTS: usize = 50;
const MIN_COMPONENTS: usize = 2;
const MAX_EMBEDDING_DIMS: usize = 30;
const MAX_NEIGHBORS: usize = 15;
const MIN_NEIGHBORS: usize = 2;
const MIN_CLUSTERS: usize = 2;
const MAX_CLUSTERS: usize = 20;

/// Normalization target for a data type.
pub fn normalization_scale(data_type: DataType) -> f64 {
    match data_type {
        DataType::Bulk => BULK_SCALE,
        DataType::SingleCell => SINGLE_CELL_SCALE,
    }
}

/// Minimum number of samples a feature must be detected in to be kept.
///
/// Bulk: `min(3, n_samples)`. Single-cell: `min(3, max(1, 1% of n_cells))`,
/// computed on the already cell-filtered matrix.
pub fn min_samples_for_feature_filter(data_type: DataType, n_samples: usize) -> usize {
    match data_type {
        DataType::Bulk => n_samples.min(3),
        DataType::SingleCell => (n_samples / 100).max(1).min(3),
    }
}

/// Minimum number of detected features a cell needs to be kept.
///
/// `min(200, 5% of n_features)`, truncated.
pub fn min_features_for_cell_filter(n_features: usize) -> usize {
    (n_features / 20).min(200)
}

/// Number of most variable features kept for PCA and correlation.
pub fn n_variable_features(data_type: DataType, n_features: usize) -> usize {
    let cap = match data_type {
        DataType::Bulk => BULK_VARIABLE_FEATURES,
        DataType::SingleCell => SINGLE_CELL_VARIABLE_FEATURES,
    };
    n_features.min(cap)
}

/// Number of principal components to compute.
///
/// Capped per data type, bounded by `n_samples - 1` and `n_features - 1`,
/// and never fewer than two.
pub fn n_pca_components(data_type: DataType, n_samples: usize, n_features: usize) -> usize {
    let cap = match data_type {
        DataType::Bulk => BULK_MAX_COMPONENTS,
        DataType::SingleCell => SINGLE_CELL_MAX_COMPONENTS,
    };
    cap.min(n_samples.saturating_sub(1))
        .min(n_features.saturating_sub(1))
        .max(MIN_COMPONENTS)
}

/// Number of PCA dimensions fed to the non-linear embedding.
pub fn n_embedding_dims(n_components: usize) -> usize {
    n_components.min(MAX_EMBEDDING_DIMS)
}

/// Neighbourhood size for the non-linear embedding.
pub fn n_neighbors(n_samples: usize) -> usize {
    MAX_NEIGHBORS
        .min(n_samples.saturating_sub(1))
        .max(MIN_NEIGHBORS)
}

/// Number of clusters for single-cell grouping.
///
/// `round(sqrt(n / 10))`, clamped to `[2, 20]`.
pub fn n_clusters(n_samples: usize) -> usize {
    let k = (n_samples as f64 / 10.0).sqrt().round() as usize;
    k.clamp(MIN_CLUSTERS, MAX_CLUSTERS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_filter_threshold() {
        assert_eq!(min_samples_for_feature_filter(DataType::Bulk, 2), 2);
        assert_eq!(min_samples_for_feature_filter(DataType::Bulk, 8), 3);
        assert_eq!(min_samples_for_feature_filter(DataType::SingleCell, 50), 1);
        assert_eq!(min_samples_for_feature_filter(DataType::SingleCell, 250), 2);
        assert_eq!(min_samples_for_feature_filter(DataType::SingleCell, 10_000), 3);
    }

    #[test]
    fn test_cell_filter_threshold() {
        assert_eq!(min_features_for_cell_filter(500), 25);
        assert_eq!(min_features_for_cell_filter(19), 0);
        assert_eq!(min_features_for_cell_filter(30_000), 200);
    }

    #[test]
    fn test_variable_features() {
        assert_eq!(n_variable_features(DataType::Bulk, 20_000), 5000);
        assert_eq!(n_variable_features(DataType::SingleCell, 20_000), 2000);
        assert_eq!(n_variable_features(DataType::SingleCell, 300), 300);
    }

    #[test]
    fn test_pca_components() {
        assert_eq!(n_pca_components(DataType::Bulk, 8, 200), 7);
        assert_eq!(n_pca_components(DataType::Bulk, 100, 200), 10);
        assert_eq!(n_pca_components(DataType::SingleCell, 1000, 2000), 50);
        assert_eq!(n_pca_components(DataType::SingleCell, 2, 2000), 2);
        assert_eq!(n_pca_components(DataType::Bulk, 1, 1), 2);
    }

    #[test]
    fn test_embedding_parameters() {
        assert_eq!(n_embedding_dims(50), 30);
        assert_eq!(n_embedding_dims(7), 7);
        assert_eq!(n_neighbors(50), 15);
        assert_eq!(n_neighbors(6), 5);
        assert_eq!(n_neighbors(2), 2);
    }

    #[test]
    fn test_cluster_count_is_bounded() {
        assert_eq!(n_clusters(5), 2);
        assert_eq!(n_clusters(100), 3);
        assert_eq!(n_clusters(100_000), 20);
        for n in [0, 1, 10, 50, 1_000, 4_000, 10_000_000] {
            let k = n_clusters(n);
            assert!((2..=20).contains(&k));
        }
    }
}
