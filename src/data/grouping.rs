//! Assignment of samples or cells to groups.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maps each sample label of a matrix to an optional group identifier.
///
/// The label set is exactly the matrix's sample set. A sample whose group
/// could not be inferred holds `None` and is excluded from differential
/// expression; it is never given a synthetic group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAssignment {
    labels: Vec<String>,
    groups: Vec<Option<String>>,
}

impl GroupAssignment {
    /// Build an assignment from parallel label and group vectors.
    ///
    /// Returns `None` if the lengths differ.
    pub fn new(labels: Vec<String>, groups: Vec<Option<String>>) -> Option<Self> {
        if labels.len() != groups.len() {
            return None;
        }
        Some(Self { labels, groups })
    }

    /// Assignment where every sample gets the group of its cluster index.
    pub fn from_clusters(labels: &[String], clusters: &[usize]) -> Self {
        Self {
            labels: labels.to_vec(),
            groups: clusters.iter().map(|c| Some(c.to_string())).collect(),
        }
    }

    /// Sample labels, in matrix order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Group per sample, in matrix order.
    pub fn groups(&self) -> &[Option<String>] {
        &self.groups
    }

    /// Group of a given sample.
    pub fn group_of(&self, label: &str) -> Option<&str> {
        self.labels
            .iter()
            .position(|l| l == label)
            .and_then(|i| self.groups[i].as_deref())
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the assignment covers no samples.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of samples with a group.
    pub fn n_assigned(&self) -> usize {
        self.groups.iter().filter(|g| g.is_some()).count()
    }

    /// Distinct group identifiers, sorted.
    pub fn distinct_groups(&self) -> Vec<String> {
        self.group_sizes().into_keys().collect()
    }

    /// Number of distinct groups.
    pub fn n_groups(&self) -> usize {
        self.group_sizes().len()
    }

    /// Number of samples per group.
    pub fn group_sizes(&self) -> BTreeMap<String, usize> {
        let mut sizes = BTreeMap::new();
        for g in self.groups.iter().flatten() {
            *sizes.entry(g.clone()).or_insert(0) += 1;
        }
        sizes
    }

    /// Column indices of the samples in a group.
    pub fn indices_of(&self, group: &str) -> Vec<usize> {
        self.groups
            .iter()
            .enumerate()
            .filter(|(_, g)| g.as_deref() == Some(group))
            .map(|(i, _)| i)
            .collect()
    }
}
