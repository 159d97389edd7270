//! Result types produced by the analysis pipelines.

use crate::data::finite;
use crate::detect::DataType;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One row of a differential-expression table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeRecord {
    /// Feature identifier.
    pub gene: String,
    /// Difference of group means in log space (B − A).
    #[serde(serialize_with = "finite::value")]
    pub log2fc: f64,
    /// Raw p-value.
    #[serde(serialize_with = "finite::value")]
    pub pvalue: f64,
    /// Benjamini-Hochberg adjusted p-value.
    #[serde(serialize_with = "finite::value")]
    pub padj: f64,
    /// Reference group label.
    pub group_a: String,
    /// Comparison group label.
    pub group_b: String,
    /// Cluster tested against the rest (marker mode only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    /// Welch t statistic, oriented B − A; absent when the test failed.
    #[serde(serialize_with = "finite::option")]
    pub statistic: Option<f64>,
    /// Mean of group A.
    #[serde(serialize_with = "finite::value")]
    pub mean_a: f64,
    /// Mean of group B.
    #[serde(serialize_with = "finite::value")]
    pub mean_b: f64,
}

impl DeRecord {
    /// Check if this record is significant at the given FDR level.
    pub fn is_significant_at(&self, alpha: f64) -> bool {
        self.padj < alpha
    }
}

/// 2-D coordinates per sample plus explained variance per component.
///
/// Serialized under the `pca_embeddings` and `pca_variance_ratio` keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResult {
    /// Per-sample coordinates (first two dimensions).
    #[serde(rename = "pca_embeddings", serialize_with = "finite::points")]
    pub coordinates: Vec<[f64; 2]>,
    /// Proportion of variance explained by each computed component, descending.
    #[serde(rename = "pca_variance_ratio", serialize_with = "finite::values")]
    pub variance_ratio: Vec<f64>,
}

impl EmbeddingResult {
    /// Number of computed components.
    pub fn n_components(&self) -> usize {
        self.variance_ratio.len()
    }

    /// Cumulative explained variance.
    pub fn cumulative_variance(&self) -> Vec<f64> {
        self.variance_ratio
            .iter()
            .scan(0.0, |acc, &v| {
                *acc += v;
                Some(*acc)
            })
            .collect()
    }
}

/// Per-cell quality-control metrics after filtering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QcMetrics {
    /// Detected features per cell.
    pub genes_per_cell: Vec<usize>,
    /// Total signal per cell.
    #[serde(serialize_with = "finite::values")]
    pub total_counts: Vec<f64>,
}

/// Sample-sample Pearson correlation over the most variable features.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleCorrelation {
    /// Square correlation matrix, row-major.
    #[serde(rename = "correlation_matrix", serialize_with = "finite::rows")]
    pub matrix: Vec<Vec<f64>>,
    /// Sample labels for rows and columns.
    #[serde(rename = "correlation_labels")]
    pub labels: Vec<String>,
}

/// Expression of the top marker genes, for heatmaps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerHeatmap {
    /// Marker genes, de-duplicated in cluster order.
    #[serde(rename = "top_gene_names")]
    pub genes: Vec<String>,
    /// Cells × genes log-normalized expression.
    #[serde(rename = "top_gene_expression", serialize_with = "finite::rows")]
    pub expression: Vec<Vec<f64>>,
}

/// Complete output of one pipeline run.
///
/// Created once per run and handed to the caller; field names follow the
/// externalized JSON shape.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    /// Which pipeline produced the result.
    pub data_type: DataType,
    /// Features before filtering.
    pub n_genes_raw: usize,
    /// Features after filtering.
    pub n_genes_filtered: usize,
    /// Samples or cells before filtering.
    pub n_samples_raw: usize,
    /// Samples or cells after filtering.
    pub n_samples: usize,
    /// Number of groups used for differential expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_clusters: Option<usize>,
    /// Sample or cell labels, in embedding order.
    pub sample_names: Vec<String>,
    /// PCA coordinates (N × 2) and explained variance per component.
    #[serde(flatten)]
    pub pca: EmbeddingResult,
    /// Non-linear embedding (N × 2), single-cell only.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "finite::option_points"
    )]
    pub umap_embeddings: Option<Vec<[f64; 2]>>,
    /// Whether `umap_embeddings` fell back to PCA coordinates.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub umap_fallback: bool,
    /// Cluster index per cell, single-cell only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clusters: Option<Vec<usize>>,
    /// Inferred condition per sample, bulk only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Option<String>>>,
    /// Differential-expression table, sorted by raw p-value and truncated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub de_results: Option<Vec<DeRecord>>,
    /// Number of DE records before truncation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_de_tested: Option<usize>,
    /// Top marker features per cluster, single-cell only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker_genes: Option<BTreeMap<usize, Vec<String>>>,
    /// Per-cell QC metrics, single-cell only.
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub qc: Option<QcMetrics>,
    /// Sample correlation, bulk only.
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<SampleCorrelation>,
    /// Marker heatmap data, single-cell only.
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub heatmap: Option<MarkerHeatmap>,
    /// Recoverable conditions encountered during the run.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl AnalysisResult {
    /// DE records, or an empty slice when DE was skipped.
    pub fn de_records(&self) -> &[DeRecord] {
        self.de_results.as_deref().unwrap_or(&[])
    }

    /// Serialize to a pretty-printed JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the result as JSON.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        Ok(())
    }

    /// Write the DE table to a TSV file.
    pub fn write_de_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(
            writer,
            "gene\tcluster\tgroup_a\tgroup_b\tlog2fc\tstatistic\tpvalue\tpadj\tmean_a\tmean_b"
        )?;
        for r in self.de_records() {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{:.6}\t{}\t{:.2e}\t{:.2e}\t{:.4}\t{:.4}",
                r.gene,
                r.cluster.as_deref().unwrap_or("NA"),
                r.group_a,
                r.group_b,
                r.log2fc,
                r.statistic
                    .map(|t| format!("{:.4}", t))
                    .unwrap_or_else(|| "NA".to_string()),
                r.pvalue,
                r.padj,
                r.mean_a,
                r.mean_b
            )?;
        }

        Ok(())
    }
}

impl std::fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Analysis Result ({})", self.data_type)?;
        writeln!(
            f,
            "  Features:  {} -> {}",
            self.n_genes_raw, self.n_genes_filtered
        )?;
        writeln!(f, "  Samples:   {} -> {}", self.n_samples_raw, self.n_samples)?;
        if let Some(k) = self.n_clusters {
            writeln!(f, "  Groups:    {}", k)?;
        }
        writeln!(f, "  PCs:       {}", self.pca.n_components())?;
        match &self.de_results {
            Some(records) => {
                let n_sig = records.iter().filter(|r| r.is_significant_at(0.05)).count();
                writeln!(f, "  DE rows:   {} ({} with padj < 0.05)", records.len(), n_sig)?;
            }
            None => writeln!(f, "  DE rows:   skipped")?,
        }
        for note in &self.notes {
            writeln!(f, "  Note: {}", note)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(gene: &str, pvalue: f64, padj: f64) -> DeRecord {
        DeRecord {
            gene: gene.to_string(),
            log2fc: 1.2,
            pvalue,
            padj,
            group_a: "control".to_string(),
            group_b: "treated".to_string(),
            cluster: None,
            statistic: Some(3.1),
            mean_a: 2.0,
            mean_b: 3.2,
        }
    }

    fn minimal_result() -> AnalysisResult {
        AnalysisResult {
            data_type: DataType::Bulk,
            n_genes_raw: 10,
            n_genes_filtered: 8,
            n_samples_raw: 4,
            n_samples: 4,
            n_clusters: None,
            sample_names: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            pca: EmbeddingResult {
                coordinates: vec![[0.0, 1.0], [f64::NAN, 0.0], [1.0, 1.0], [2.0, 2.0]],
                variance_ratio: vec![0.6, 0.3],
            },
            umap_embeddings: None,
            umap_fallback: false,
            clusters: None,
            conditions: None,
            de_results: None,
            n_de_tested: None,
            marker_genes: None,
            qc: None,
            correlation: None,
            heatmap: None,
            notes: vec![],
        }
    }

    #[test]
    fn test_embedding_cumulative_variance() {
        let embedding = EmbeddingResult {
            coordinates: vec![[0.0, 0.0]],
            variance_ratio: vec![0.5, 0.3, 0.1],
        };
        let cumulative = embedding.cumulative_variance();
        assert!((cumulative[2] - 0.9).abs() < 1e-12);
        assert_eq!(embedding.n_components(), 3);
    }

    #[test]
    fn test_absent_sections_are_omitted() {
        let json = minimal_result().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["data_type"], "bulk");
        assert!(value.get("de_results").is_none());
        assert!(value.get("umap_embeddings").is_none());
        assert!(value.get("correlation_matrix").is_none());
        assert!(value["pca_embeddings"][1][0].is_null());
        assert_eq!(value["pca_variance_ratio"][0], 0.6);
        assert!(value.get("pca").is_none());
    }

    #[test]
    fn test_marker_genes_in_numeric_cluster_order() {
        let mut result = minimal_result();
        result.marker_genes = Some(
            (0..12)
                .map(|c| (c, vec![format!("G{}", c)]))
                .collect(),
        );
        let json = result.to_json().unwrap();
        let pos = |key: &str| json.find(&format!("\"{}\": [", key)).unwrap();
        assert!(pos("2") < pos("10"));
        assert!(pos("9") < pos("11"));
    }

    #[test]
    fn test_de_records_serialize_flat() {
        let mut result = minimal_result();
        result.de_results = Some(vec![record("G1", 0.01, 0.02)]);
        result.correlation = Some(SampleCorrelation {
            matrix: vec![vec![1.0]],
            labels: vec!["a".into()],
        });

        let value: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        let de = &value["de_results"][0];
        assert_eq!(de["gene"], "G1");
        assert_eq!(de["group_b"], "treated");
        assert!(de.get("cluster").is_none());
        assert_eq!(value["correlation_labels"][0], "a");
    }

    #[test]
    fn test_write_de_tsv() {
        let mut result = minimal_result();
        result.de_results = Some(vec![record("G1", 0.01, 0.02), record("G2", 0.2, 0.2)]);
        let file = tempfile::NamedTempFile::new().unwrap();
        result.write_de_tsv(file.path()).unwrap();

        let contents = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("G1\tNA\tcontrol\ttreated"));
    }
}
