//! Data structures for expression analysis.

mod expression_matrix;
pub mod finite;
mod grouping;
mod metadata;
mod result;

pub use expression_matrix::ExpressionMatrix;
pub use grouping::GroupAssignment;
pub use metadata::{SampleMetadata, SampleRecord};
pub use result::{
    AnalysisResult, DeRecord, EmbeddingResult, MarkerHeatmap, QcMetrics, SampleCorrelation,
};
