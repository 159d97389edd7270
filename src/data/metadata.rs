//! Free-text sample metadata used for type detection and condition inference.

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Descriptive text for a single sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Sample title, e.g. "control rep1".
    #[serde(default)]
    pub title: String,
    /// Descriptive characteristics, e.g. "tissue: liver".
    #[serde(default)]
    pub characteristics: Vec<String>,
}

impl SampleRecord {
    /// Create a record from a title and characteristics.
    pub fn new(title: impl Into<String>, characteristics: Vec<String>) -> Self {
        Self {
            title: title.into(),
            characteristics,
        }
    }

    /// Title and characteristics joined into one lower-cased string.
    pub fn text(&self) -> String {
        let mut text = self.title.clone();
        for c in &self.characteristics {
            text.push(' ');
            text.push_str(c);
        }
        text.to_lowercase()
    }
}

/// Series-level and per-sample free-text metadata.
///
/// Read-only once built; used only to classify the dataset and to infer
/// conditions for bulk differential expression.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleMetadata {
    /// Series title.
    #[serde(default)]
    pub title: String,
    /// Series summary.
    #[serde(default)]
    pub summary: String,
    /// Overall design description.
    #[serde(default)]
    pub overall_design: String,
    /// Experiment type(s).
    #[serde(default)]
    pub series_type: Vec<String>,
    /// Any other series-level text fields.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
    /// Per-sample records keyed by sample ID.
    #[serde(default)]
    pub samples: BTreeMap<String, SampleRecord>,
}

impl SampleMetadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build metadata from `(sample_id, title)` pairs.
    pub fn from_titles<I, S, T>(titles: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        let samples = titles
            .into_iter()
            .map(|(id, title)| (id.into(), SampleRecord::new(title, Vec::new())))
            .collect();
        Self {
            samples,
            ..Self::default()
        }
    }

    /// Set the series title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the series summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Add or replace a sample record.
    pub fn with_sample(mut self, sample_id: impl Into<String>, record: SampleRecord) -> Self {
        self.samples.insert(sample_id.into(), record);
        self
    }

    /// Load a per-sample sheet from a TSV file.
    ///
    /// Expected format:
    /// - First row: header, first column is the sample ID; a `title` column and
    ///   an optional `characteristics` column are recognized
    /// - Characteristics are separated by `;`
    /// - Unrecognized columns are appended to the characteristics as `column: value`
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| AnalysisError::EmptyData("Empty metadata file".to_string()))??;
        let header: Vec<String> = header_line
            .split('\t')
            .map(|s| s.trim().to_string())
            .collect();
        if header.len() < 2 {
            return Err(AnalysisError::EmptyData(
                "Metadata must have at least one column besides the sample ID".to_string(),
            ));
        }

        let mut samples = BTreeMap::new();
        for line_result in lines {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let sample_id = fields[0].trim().to_string();
            let mut record = SampleRecord::default();

            for (col_name, value) in header[1..].iter().zip(fields[1..].iter()) {
                let value = value.trim();
                if value.is_empty() || value == "NA" {
                    continue;
                }
                match col_name.to_lowercase().as_str() {
                    "title" => record.title = value.to_string(),
                    "characteristics" | "characteristics_ch1" => record.characteristics.extend(
                        value
                            .split(';')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(String::from),
                    ),
                    _ => record
                        .characteristics
                        .push(format!("{}: {}", col_name, value)),
                }
            }
            samples.insert(sample_id, record);
        }

        if samples.is_empty() {
            return Err(AnalysisError::EmptyData("No samples in metadata".to_string()));
        }

        Ok(Self {
            samples,
            ..Self::default()
        })
    }

    /// Load metadata from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(AnalysisError::from)
    }

    /// Load metadata from a file, choosing the format by extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&std::fs::read_to_string(path)?),
            _ => Self::from_tsv(path),
        }
    }

    /// Number of sample records.
    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    /// Get the record for a sample.
    pub fn sample(&self, sample_id: &str) -> Option<&SampleRecord> {
        self.samples.get(sample_id)
    }

    /// Every free-text value, series-level first, then per sample.
    pub fn text_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = vec![
            self.title.as_str(),
            self.summary.as_str(),
            self.overall_design.as_str(),
        ];
        fields.extend(self.series_type.iter().map(String::as_str));
        fields.extend(self.extra.values().map(String::as_str));
        for record in self.samples.values() {
            fields.push(record.title.as_str());
            fields.extend(record.characteristics.iter().map(String::as_str));
        }
        fields.retain(|f| !f.is_empty());
        fields
    }
}
