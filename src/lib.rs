//! Gene-expression analysis core.
//!
//! Classifies an expression dataset as bulk or single-cell and runs the
//! matching pipeline: quality-control filtering, library-size normalization,
//! PCA (plus a 2-D neighbour-graph embedding for single-cell data), grouping
//! and differential expression with Benjamini-Hochberg correction.
//!
//! # Overview
//!
//! - **data**: Expression matrix, sample metadata, group assignments, results
//! - **detect**: Bulk vs single-cell classification
//! - **filter**: Feature and cell QC filtering
//! - **normalize**: Library-size normalization with log1p
//! - **reduce**: Variable features, PCA, UMAP, sample correlation
//! - **group**: k-means clustering and condition inference
//! - **test**: Welch's t-test
//! - **correct**: Multiple testing correction (Benjamini-Hochberg)
//! - **de**: Two-group comparisons and cluster markers
//! - **pipeline**: Bulk and single-cell pipelines
//! - **worker**: Job status reporting and the worker pool
//!
//! # Example
//!
//! ```no_run
//! use geolyze::prelude::*;
//!
//! let matrix = ExpressionMatrix::from_tsv("expression.tsv").unwrap();
//! let metadata = SampleMetadata::from_path("samples.tsv").unwrap();
//!
//! let result = Analyzer::new(AnalysisConfig::default())
//!     .run(&matrix, &metadata)
//!     .unwrap();
//! println!("{}", result);
//! ```

pub mod config;
pub mod correct;
pub mod data;
pub mod de;
pub mod detect;
pub mod error;
pub mod filter;
pub mod group;
pub mod normalize;
pub mod outcome;
pub mod pipeline;
pub mod policy;
pub mod reduce;
pub mod test;
pub mod worker;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::config::AnalysisConfig;
    pub use crate::correct::{adjust_or_fallback, correct_bh, BhCorrected};
    pub use crate::data::{
        AnalysisResult, DeRecord, EmbeddingResult, ExpressionMatrix, GroupAssignment,
        MarkerHeatmap, QcMetrics, SampleCorrelation, SampleMetadata, SampleRecord,
    };
    pub use crate::de::{find_markers, test_two_groups, DeTable, MarkerConfig, MarkerResult};
    pub use crate::detect::{detect, DataType, Detection};
    pub use crate::error::{AnalysisError, Result};
    pub use crate::filter::{filter_cells, filter_features, FilterReport};
    pub use crate::group::{
        cluster_cells, infer_conditions, kmeans, ConditionInference, Grouping, KMeansConfig,
    };
    pub use crate::normalize::{norm_library_size, normalize_for, NormalizedMatrix};
    pub use crate::outcome::Outcome;
    pub use crate::pipeline::{Analyzer, BulkPipeline, SingleCellPipeline};
    pub use crate::reduce::{
        embed_or_fallback, pca, sample_correlation, Embedder, Pca, Umap, UmapConfig,
    };
    pub use crate::test::{welch_t_test, TestOutcome, WelchResult};
    pub use crate::worker::{
        AnalysisJob, JobRunner, JobStatus, LoggingSink, MemorySink, ProgressSink, StatusUpdate,
        WorkerPool,
    };
}
