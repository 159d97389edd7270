//! Heuristic classification of a dataset as bulk or single-cell.
//!
//! Three signals contribute to a signed score: single-cell technology
//! keywords in the metadata text, the sample count, and the fraction of zero
//! entries. A score of two or more means single-cell.

use crate::data::{ExpressionMatrix, SampleMetadata};
use crate::error::AnalysisError;
use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

// "10x" only counts as part of "10x genomics"; on its own it also matches
// magnifications and dilutions.
static SINGLE_CELL_KEYWORDS: OnceLock<Regex> = OnceLock::new();

fn single_cell_keywords() -> &'static Regex {
    SINGLE_CELL_KEYWORDS.get_or_init(|| {
        Regex::new(
            r"(?i)single.?cell|scrna|10x\s?genomics|drop.?seq|smart.?seq|chromium|cel.?seq|indrop|sci.?rna|snrna|single.?nucleus",
        )
        .expect("single-cell keyword regex must compile")
    })
}

/// Kind of expression data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Bulk expression, one column per sample.
    Bulk,
    /// Single-cell expression, one column per cell.
    SingleCell,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Bulk => write!(f, "bulk"),
            DataType::SingleCell => write!(f, "single_cell"),
        }
    }
}

impl FromStr for DataType {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "bulk" => Ok(DataType::Bulk),
            "single_cell" | "singlecell" | "sc" => Ok(DataType::SingleCell),
            other => Err(AnalysisError::InvalidParameter(format!(
                "Unknown data type '{}'. Use 'bulk' or 'single_cell'",
                other
            ))),
        }
    }
}

/// Score threshold at or above which a dataset is single-cell.
pub const SINGLE_CELL_SCORE: i32 = 2;

/// Outcome of type detection with the contribution of each signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Decision.
    pub data_type: DataType,
    /// Total score.
    pub score: i32,
    /// Keyword matched in the metadata text, if any.
    pub keyword: Option<String>,
    /// Contribution of the keyword signal.
    pub keyword_score: i32,
    /// Number of samples in the matrix.
    pub n_samples: usize,
    /// Contribution of the sample-count signal.
    pub sample_score: i32,
    /// Fraction of zero entries; `None` when it could not be computed.
    pub zero_fraction: Option<f64>,
    /// Contribution of the sparsity signal.
    pub sparsity_score: i32,
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Data Type Detection")?;
        writeln!(f, "  Decision:      {} (score {})", self.data_type, self.score)?;
        match &self.keyword {
            Some(k) => writeln!(f, "  Keyword:       '{}' ({:+})", k, self.keyword_score)?,
            None => writeln!(f, "  Keyword:       none ({:+})", self.keyword_score)?,
        }
        writeln!(f, "  Samples:       {} ({:+})", self.n_samples, self.sample_score)?;
        match self.zero_fraction {
            Some(z) => writeln!(
                f,
                "  Zero fraction: {:.1}% ({:+})",
                z * 100.0,
                self.sparsity_score
            )?,
            None => writeln!(f, "  Zero fraction: n/a")?,
        }
        Ok(())
    }
}

/// Score contribution of the sample count.
pub fn sample_count_score(n_samples: usize) -> i32 {
    if n_samples > 500 {
        2
    } else if n_samples > 100 {
        1
    } else if n_samples <= 30 {
        -2
    } else {
        0
    }
}

/// Score contribution of the zero fraction.
pub fn sparsity_score(zero_fraction: Option<f64>) -> i32 {
    match zero_fraction {
        Some(z) if z > 0.7 => 1,
        _ => 0,
    }
}

/// First single-cell technology keyword found in the metadata text.
pub fn find_keyword(metadata: &SampleMetadata) -> Option<String> {
    let re = single_cell_keywords();
    metadata
        .text_fields()
        .into_iter()
        .find_map(|text| re.find(text).map(|m| m.as_str().to_string()))
}

/// Classify a dataset as bulk or single-cell.
pub fn detect(matrix: &ExpressionMatrix, metadata: &SampleMetadata) -> Detection {
    let keyword = find_keyword(metadata);
    let keyword_score = if keyword.is_some() { 3 } else { 0 };

    let n_samples = matrix.n_samples();
    let sample_score = sample_count_score(n_samples);

    let zero_fraction = matrix.zero_fraction();
    if zero_fraction.is_none() {
        debug!("Zero fraction unavailable for an empty matrix, skipping sparsity signal");
    }
    let sparsity_score = sparsity_score(zero_fraction);

    let score = keyword_score + sample_score + sparsity_score;
    let data_type = if score >= SINGLE_CELL_SCORE {
        DataType::SingleCell
    } else {
        DataType::Bulk
    };

    info!(
        "Detected {} data (score {}: keyword {:+}, samples {:+}, sparsity {:+})",
        data_type, score, keyword_score, sample_score, sparsity_score
    );

    Detection {
        data_type,
        score,
        keyword,
        keyword_score,
        n_samples,
        sample_score,
        zero_fraction,
        sparsity_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(n_features: usize, n_samples: usize, density: usize) -> ExpressionMatrix {
        let rows: Vec<Vec<f64>> = (0..n_features)
            .map(|i| {
                (0..n_samples)
                    .map(|j| if (i + j) % density == 0 { 5.0 } else { 0.0 })
                    .collect()
            })
            .collect();
        ExpressionMatrix::from_rows(
            &rows,
            (0..n_features).map(|i| format!("G{}", i)).collect(),
            (0..n_samples).map(|j| format!("S{}", j)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_keyword_variants() {
        for text in [
            "10x Genomics Chromium",
            "Drop-seq of retina",
            "single cell RNA",
            "Single-nucleus profiling",
            "snRNA-seq",
            "SMART-Seq2",
        ] {
            let meta = SampleMetadata::new().with_summary(text);
            assert!(find_keyword(&meta).is_some(), "no keyword in '{}'", text);
        }
        let meta = SampleMetadata::new().with_summary("RNA-seq of liver tissue");
        assert!(find_keyword(&meta).is_none());
    }

    #[test]
    fn test_bare_10x_is_not_a_keyword() {
        for text in ["imaged at 10x magnification", "10x dilution series"] {
            let meta = SampleMetadata::new().with_summary(text);
            assert!(find_keyword(&meta).is_none(), "keyword found in '{}'", text);
        }
        let meta = SampleMetadata::new().with_summary("10xGenomics v3 libraries");
        assert_eq!(find_keyword(&meta).as_deref(), Some("10xGenomics"));
    }

    #[test]
    fn test_small_dense_bulk() {
        let detection = detect(&matrix(50, 8, 1), &SampleMetadata::new());
        assert_eq!(detection.data_type, DataType::Bulk);
        assert_eq!(detection.sample_score, -2);
        assert_eq!(detection.score, -2);
    }

    #[test]
    fn test_keyword_alone_is_not_enough_for_small_studies() {
        let meta = SampleMetadata::new().with_title("10x Genomics study");
        let detection = detect(&matrix(50, 8, 1), &meta);
        assert_eq!(detection.score, 1);
        assert_eq!(detection.data_type, DataType::Bulk);
    }

    #[test]
    fn test_many_sparse_cells_are_single_cell() {
        let detection = detect(&matrix(40, 600, 5), &SampleMetadata::new());
        assert_eq!(detection.sample_score, 2);
        assert_eq!(detection.sparsity_score, 1);
        assert_eq!(detection.data_type, DataType::SingleCell);
    }

    #[test]
    fn test_sample_count_thresholds() {
        assert_eq!(sample_count_score(30), -2);
        assert_eq!(sample_count_score(31), 0);
        assert_eq!(sample_count_score(100), 0);
        assert_eq!(sample_count_score(101), 1);
        assert_eq!(sample_count_score(501), 2);
        assert_eq!(sparsity_score(Some(0.7)), 0);
        assert_eq!(sparsity_score(None), 0);
    }

    #[test]
    fn test_data_type_parsing() {
        assert_eq!("single-cell".parse::<DataType>().unwrap(), DataType::SingleCell);
        assert_eq!("Bulk".parse::<DataType>().unwrap(), DataType::Bulk);
        assert!("spatial".parse::<DataType>().is_err());
        assert_eq!(
            serde_json::to_string(&DataType::SingleCell).unwrap(),
            "\"single_cell\""
        );
    }
}
