//! Analysis settings loaded from YAML.
//!
//! The adaptive thresholds that depend on dataset shape live in
//! [`crate::policy`] and are not configurable; this file covers seeds,
//! iteration counts and output sizes.

use crate::de::MarkerConfig;
use crate::detect::DataType;
use crate::error::{AnalysisError, Result};
use crate::group::KMeansConfig;
use crate::reduce::UmapConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings shared by both pipelines and the job runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Force a pipeline instead of detecting the data type.
    pub data_type: Option<DataType>,
    /// Seed for clustering and the embedding layout.
    pub seed: u64,
    /// Number of k-means initializations.
    pub kmeans_n_init: usize,
    /// Maximum Lloyd iterations per k-means run.
    pub kmeans_max_iter: usize,
    /// Embedding optimization epochs.
    pub umap_epochs: usize,
    /// Embedding minimum distance.
    pub umap_min_dist: f64,
    /// Largest cell count embedded; larger runs use the PCA coordinates.
    pub umap_max_cells: usize,
    /// Markers kept per cluster.
    pub marker_top_n: usize,
    /// Leading markers tested per cluster.
    pub marker_tested_per_cluster: usize,
    /// Maximum DE records in the result.
    pub max_de_records: usize,
    /// Markers per cluster shown in the heatmap.
    pub heatmap_genes_per_cluster: usize,
    /// Maximum heatmap genes.
    pub heatmap_max_genes: usize,
    /// Pipeline executions allowed to run at once.
    pub max_concurrent_jobs: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            data_type: None,
            seed: 42,
            kmeans_n_init: 10,
            kmeans_max_iter: 300,
            umap_epochs: 200,
            umap_min_dist: 0.1,
            umap_max_cells: 20_000,
            marker_top_n: 20,
            marker_tested_per_cluster: 10,
            max_de_records: 500,
            heatmap_genes_per_cluster: 5,
            heatmap_max_genes: 50,
            max_concurrent_jobs: 2,
        }
    }
}

impl AnalysisConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(AnalysisError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(AnalysisError::from)
    }

    /// Load from a YAML file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    /// Check that counts are positive and distances non-negative.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("kmeans_n_init", self.kmeans_n_init),
            ("kmeans_max_iter", self.kmeans_max_iter),
            ("marker_top_n", self.marker_top_n),
            ("umap_max_cells", self.umap_max_cells),
            ("max_de_records", self.max_de_records),
            ("max_concurrent_jobs", self.max_concurrent_jobs),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(AnalysisError::InvalidParameter(format!(
                "{} must be positive",
                name
            )));
        }
        if self.umap_min_dist.is_nan() || self.umap_min_dist < 0.0 {
            return Err(AnalysisError::InvalidParameter(
                "umap_min_dist must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    /// K-means settings for `n_clusters` clusters.
    pub fn kmeans(&self, n_clusters: usize) -> KMeansConfig {
        KMeansConfig {
            n_clusters,
            n_init: self.kmeans_n_init,
            max_iter: self.kmeans_max_iter,
            seed: self.seed,
            ..KMeansConfig::default()
        }
    }

    /// Embedding layout settings.
    pub fn umap(&self) -> UmapConfig {
        UmapConfig {
            min_dist: self.umap_min_dist,
            n_epochs: self.umap_epochs,
            seed: self.seed,
            max_observations: self.umap_max_cells,
            ..UmapConfig::default()
        }
    }

    /// Marker selection settings.
    pub fn markers(&self) -> MarkerConfig {
        MarkerConfig {
            top_n: self.marker_top_n,
            tested_per_cluster: self.marker_tested_per_cluster,
            heatmap_per_cluster: self.heatmap_genes_per_cluster,
            heatmap_max_genes: self.heatmap_max_genes,
        }
    }
}
