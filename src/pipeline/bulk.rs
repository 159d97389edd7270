//! Bulk pipeline: CPM normalization, PCA, sample correlation and a
//! control-vs-treated comparison inferred from the sample metadata.

use super::{de_section, principal_components};
use crate::config::AnalysisConfig;
use crate::data::{AnalysisResult, ExpressionMatrix, SampleMetadata};
use crate::de::test_two_groups;
use crate::detect::DataType;
use crate::error::Result;
use crate::filter::{filter_features, require_remaining};
use crate::group::{infer_conditions, ConditionInference, CONTROL, TREATED};
use crate::normalize::normalize_for;
use crate::policy::{MIN_BULK_SAMPLES, MIN_FEATURES_AFTER_FILTER};
use crate::reduce::sample_correlation;
use log::{debug, info, warn};

/// Pipeline for bulk RNA-seq and array data.
#[derive(Debug, Clone, Default)]
pub struct BulkPipeline {
    config: AnalysisConfig,
}

impl BulkPipeline {
    /// Create a pipeline with the given settings.
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline.
    ///
    /// Fails only when too few features or samples survive filtering.
    /// Differential expression is omitted when no two-group split can be
    /// inferred from the metadata.
    pub fn run(&self, matrix: &ExpressionMatrix, metadata: &SampleMetadata) -> Result<AnalysisResult> {
        info!(
            "Bulk pipeline: {} features x {} samples",
            matrix.n_features(),
            matrix.n_samples()
        );
        let mut notes = Vec::new();

        let (filtered, report) = filter_features(matrix, DataType::Bulk)?;
        debug!("{}", report);
        require_remaining("features", filtered.n_features(), MIN_FEATURES_AFTER_FILTER)?;
        require_remaining("samples", filtered.n_samples(), MIN_BULK_SAMPLES)?;

        let norm = normalize_for(&filtered, DataType::Bulk)?;
        let (features, pca) = principal_components(&norm, DataType::Bulk)?;
        let correlation = sample_correlation(&norm, &features);

        let mut conditions = None;
        let mut n_groups = None;
        let mut de_results = None;
        let mut n_de_tested = None;
        match infer_conditions(&norm.sample_ids, metadata) {
            ConditionInference::Inferred(assignment) => {
                match test_two_groups(&norm, &assignment, CONTROL, TREATED)? {
                    Some(table) => {
                        info!(
                            "{} vs {}: {} features tested",
                            TREATED,
                            CONTROL,
                            table.len()
                        );
                        let (records, n_tested) =
                            de_section(table, self.config.max_de_records, &mut notes);
                        de_results = Some(records);
                        n_de_tested = Some(n_tested);
                    }
                    None => {
                        warn!("Differential expression skipped after condition inference");
                        notes.push("differential expression skipped: groups too small".to_string());
                    }
                }
                n_groups = Some(assignment.n_groups());
                conditions = Some(assignment.groups().to_vec());
            }
            ConditionInference::Ambiguous { reason } => {
                notes.push(format!("differential expression skipped: {}", reason));
            }
        }

        Ok(AnalysisResult {
            data_type: DataType::Bulk,
            n_genes_raw: matrix.n_features(),
            n_genes_filtered: norm.n_features(),
            n_samples_raw: matrix.n_samples(),
            n_samples: norm.n_samples(),
            n_clusters: n_groups,
            sample_names: norm.sample_ids.clone(),
            pca: pca.to_embedding(),
            umap_embeddings: None,
            umap_fallback: false,
            clusters: None,
            conditions,
            de_results,
            n_de_tested,
            marker_genes: None,
            qc: None,
            correlation: Some(correlation),
            heatmap: None,
            notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;

    /// Deterministic pseudo-random noise in [0, 1).
    fn lcg(state: &mut u64) -> f64 {
        *state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (*state >> 33) as f64 / (1u64 << 31) as f64
    }

    fn bulk_matrix(n_features: usize, n_samples: usize) -> ExpressionMatrix {
        let mut state = 11u64;
        let rows: Vec<Vec<f64>> = (0..n_features)
            .map(|i| {
                (0..n_samples)
                    .map(|j| {
                        let shift = if i < 10 && j >= n_samples / 2 { 400.0 } else { 0.0 };
                        100.0 + (i % 7) as f64 * 20.0 + shift + (lcg(&mut state) * 30.0).round()
                    })
                    .collect()
            })
            .collect();
        let features = (0..n_features).map(|i| format!("G{}", i)).collect();
        let samples = (0..n_samples).map(|j| format!("S{}", j)).collect();
        ExpressionMatrix::from_rows(&rows, features, samples).unwrap()
    }

    fn titles(n: usize) -> SampleMetadata {
        SampleMetadata::from_titles((0..n).map(|j| {
            let label = if j < n / 2 { "control" } else { "treated" };
            (format!("S{}", j), format!("{} rep{}", label, j))
        }))
    }

    #[test]
    fn test_control_vs_treated() {
        let matrix = bulk_matrix(50, 6);
        let result = BulkPipeline::default().run(&matrix, &titles(6)).unwrap();

        assert_eq!(result.data_type, DataType::Bulk);
        assert_eq!(result.n_clusters, Some(2));
        let records = result.de_results.as_ref().unwrap();
        assert_eq!(records.len(), 50);
        assert!(records.iter().all(|r| r.padj >= r.pvalue));
        assert!(records.windows(2).all(|w| w[0].pvalue <= w[1].pvalue));
        assert_eq!(records[0].group_a, CONTROL);
        assert_eq!(records[0].group_b, TREATED);
        assert!(records[0].log2fc > 0.0);

        let correlation = result.correlation.as_ref().unwrap();
        assert_eq!(correlation.labels.len(), 6);
        assert!(result.pca.variance_ratio.len() >= 2);
    }

    #[test]
    fn test_truncation_keeps_tested_count() {
        let matrix = bulk_matrix(40, 6);
        let config = AnalysisConfig {
            max_de_records: 5,
            ..Default::default()
        };
        let result = BulkPipeline::new(config).run(&matrix, &titles(6)).unwrap();
        assert_eq!(result.de_records().len(), 5);
        assert_eq!(result.n_de_tested, Some(40));
    }

    #[test]
    fn test_no_conditions_skips_de() {
        let matrix = bulk_matrix(30, 4);
        let result = BulkPipeline::default()
            .run(&matrix, &SampleMetadata::new())
            .unwrap();
        assert!(result.de_results.is_none());
        assert!(result.conditions.is_none());
        assert!(!result.notes.is_empty());
        assert_eq!(result.pca.coordinates.len(), 4);
    }

    #[test]
    fn test_too_few_features_is_input_error() {
        let matrix = bulk_matrix(8, 6);
        let err = BulkPipeline::default().run(&matrix, &titles(6)).unwrap_err();
        assert!(err.is_input_error());
        assert!(matches!(
            err,
            AnalysisError::InsufficientData { what: "features", remaining: 8, .. }
        ));
    }
}
