//! Data-type dispatch between the bulk and single-cell pipelines.

use super::{BulkPipeline, SingleCellPipeline};
use crate::config::AnalysisConfig;
use crate::data::{AnalysisResult, ExpressionMatrix, SampleMetadata};
use crate::detect::{detect, DataType, Detection};
use crate::error::Result;
use crate::reduce::Embedder;
use log::info;
use std::sync::Arc;

/// Detects the data type and runs the matching pipeline.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalysisConfig,
    single_cell: SingleCellPipeline,
}

impl Analyzer {
    /// Create an analyzer with the given settings.
    pub fn new(config: AnalysisConfig) -> Self {
        let single_cell = SingleCellPipeline::new(config.clone());
        Self {
            config,
            single_cell,
        }
    }

    /// Use a different embedder for single-cell runs.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.single_cell = self.single_cell.with_embedder(embedder);
        self
    }

    /// Settings in use.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Score the dataset for type detection.
    pub fn detect(&self, matrix: &ExpressionMatrix, metadata: &SampleMetadata) -> Detection {
        detect(matrix, metadata)
    }

    /// The pipeline to run: the configured override, else the detected type.
    pub fn data_type(&self, detection: &Detection) -> DataType {
        match self.config.data_type {
            Some(forced) => {
                if forced != detection.data_type {
                    info!(
                        "Data type forced to {} (detected {})",
                        forced, detection.data_type
                    );
                }
                forced
            }
            None => detection.data_type,
        }
    }

    /// Run the pipeline for a known data type.
    pub fn run_as(
        &self,
        data_type: DataType,
        matrix: &ExpressionMatrix,
        metadata: &SampleMetadata,
    ) -> Result<AnalysisResult> {
        match data_type {
            DataType::Bulk => BulkPipeline::new(self.config.clone()).run(matrix, metadata),
            DataType::SingleCell => self.single_cell.run(matrix),
        }
    }

    /// Detect the data type and run the matching pipeline.
    pub fn run(&self, matrix: &ExpressionMatrix, metadata: &SampleMetadata) -> Result<AnalysisResult> {
        let detection = self.detect(matrix, metadata);
        self.run_as(self.data_type(&detection), matrix, metadata)
    }
}
