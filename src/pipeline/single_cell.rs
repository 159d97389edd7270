//! Single-cell pipeline: cell and gene QC, per-cell normalization, PCA,
//! a 2-D embedding, k-means clustering and one-vs-rest markers.

use super::{de_section, principal_components};
use crate::config::AnalysisConfig;
use crate::data::{AnalysisResult, ExpressionMatrix, QcMetrics};
use crate::de::find_markers;
use crate::detect::DataType;
use crate::error::Result;
use crate::filter::{filter_cells, filter_features, require_remaining};
use crate::group::{cluster_cells, Grouping};
use crate::normalize::normalize_for;
use crate::policy::{self, MIN_CELLS_AFTER_FILTER, MIN_FEATURES_AFTER_FILTER};
use crate::reduce::{embed_or_fallback, Embedder, Umap};
use log::{debug, info};
use std::fmt;
use std::sync::Arc;

/// Pipeline for single-cell count matrices.
#[derive(Clone)]
pub struct SingleCellPipeline {
    config: AnalysisConfig,
    embedder: Arc<dyn Embedder>,
}

impl fmt::Debug for SingleCellPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleCellPipeline")
            .field("config", &self.config)
            .field("embedder", &self.embedder.name())
            .finish()
    }
}

impl Default for SingleCellPipeline {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl SingleCellPipeline {
    /// Create a pipeline using the built-in UMAP layout.
    pub fn new(config: AnalysisConfig) -> Self {
        let embedder = Arc::new(Umap::new(config.umap()));
        Self { config, embedder }
    }

    /// Replace the embedder.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = embedder;
        self
    }

    /// Run the pipeline.
    ///
    /// Fails only when fewer than ten cells or genes survive QC. An embedding
    /// failure falls back to the first two principal components, and a
    /// degenerate embedding skips clustering and markers.
    pub fn run(&self, matrix: &ExpressionMatrix) -> Result<AnalysisResult> {
        info!(
            "Single-cell pipeline: {} genes x {} cells",
            matrix.n_features(),
            matrix.n_samples()
        );
        let mut notes = Vec::new();

        let (cells, cell_report) = filter_cells(matrix)?;
        debug!("{}", cell_report);
        let (filtered, gene_report) = filter_features(&cells, DataType::SingleCell)?;
        debug!("{}", gene_report);
        require_remaining("cells", filtered.n_samples(), MIN_CELLS_AFTER_FILTER)?;
        require_remaining("genes", filtered.n_features(), MIN_FEATURES_AFTER_FILTER)?;

        let qc = QcMetrics {
            genes_per_cell: filtered.detected_per_sample(),
            total_counts: filtered.col_sums(),
        };

        let norm = normalize_for(&filtered, DataType::SingleCell)?;
        let n_cells = norm.n_samples();
        let (_, pca) = principal_components(&norm, DataType::SingleCell)?;

        let n_dims = policy::n_embedding_dims(pca.n_components());
        let embedding = embed_or_fallback(
            self.embedder.as_ref(),
            &pca,
            n_dims,
            policy::n_neighbors(n_cells),
        );
        let umap_fallback = embedding.is_fallback();
        if let Some(reason) = embedding.reason() {
            notes.push(format!("embedding fell back to PCA: {}", reason));
        }

        let k = policy::n_clusters(n_cells);
        let grouping = cluster_cells(&pca.leading(n_dims), &norm.sample_ids, &self.config.kmeans(k));

        let mut clusters = None;
        let mut n_clusters = None;
        let mut marker_genes = None;
        let mut heatmap = None;
        let mut de_results = None;
        let mut n_de_tested = None;
        match grouping {
            Grouping::Clustered {
                clusters: labels,
                n_clusters: n,
                assignment,
            } => {
                info!("Clustered {} cells into {} clusters", n_cells, n);
                let marker_config = self.config.markers();
                let markers = find_markers(&norm, &assignment, &marker_config)?;
                if markers.markers.is_empty() {
                    notes.push("no cluster large enough for marker detection".to_string());
                } else {
                    heatmap = Some(markers.heatmap(&norm, &marker_config));
                }
                if !markers.table.is_empty() {
                    let (records, n_tested) =
                        de_section(markers.table, self.config.max_de_records, &mut notes);
                    de_results = Some(records);
                    n_de_tested = Some(n_tested);
                }
                marker_genes = Some(markers.markers);
                clusters = Some(labels);
                n_clusters = Some(n);
            }
            Grouping::Skipped { reason } => {
                notes.push(format!("clustering skipped: {}", reason));
            }
        }

        Ok(AnalysisResult {
            data_type: DataType::SingleCell,
            n_genes_raw: matrix.n_features(),
            n_genes_filtered: norm.n_features(),
            n_samples_raw: matrix.n_samples(),
            n_samples: n_cells,
            n_clusters,
            sample_names: norm.sample_ids.clone(),
            pca: pca.to_embedding(),
            umap_embeddings: Some(embedding.into_value()),
            umap_fallback,
            clusters,
            conditions: None,
            de_results,
            n_de_tested,
            marker_genes,
            qc: Some(qc),
            correlation: None,
            heatmap,
            notes,
        })
    }
}
