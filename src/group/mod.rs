//! Assignment of samples or cells to groups for differential expression.
//!
//! Single-cell data is clustered; bulk data is split by conditions inferred
//! from the sample metadata text.

pub mod conditions;
pub mod kmeans;

pub use conditions::{classify_text, infer_conditions, ConditionInference, CONTROL, TREATED};
pub use kmeans::{cluster_cells, kmeans, KMeansConfig, KMeansResult};

use crate::data::GroupAssignment;

/// Outcome of clustering.
#[derive(Debug, Clone, PartialEq)]
pub enum Grouping {
    /// Every cell was assigned a cluster.
    Clustered {
        /// Cluster index per cell.
        clusters: Vec<usize>,
        /// Number of clusters requested.
        n_clusters: usize,
        /// The clusters as a group assignment.
        assignment: GroupAssignment,
    },
    /// Clustering could not run on this embedding.
    Skipped {
        /// Why clustering was skipped.
        reason: String,
    },
}

impl Grouping {
    /// The assignment, if clustering ran.
    pub fn assignment(&self) -> Option<&GroupAssignment> {
        match self {
            Grouping::Clustered { assignment, .. } => Some(assignment),
            Grouping::Skipped { .. } => None,
        }
    }
}
