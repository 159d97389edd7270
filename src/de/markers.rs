//! One-vs-rest marker detection for clusters.

use crate::data::{DeRecord, GroupAssignment, MarkerHeatmap};
use crate::de::adjust_and_sort;
use crate::de::two_group::DeTable;
use crate::error::{AnalysisError, Result};
use crate::normalize::NormalizedMatrix;
use crate::policy::MIN_GROUP_SIZE;
use crate::test::welch_t_test;
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Label of the comparison group in marker records.
pub const REST: &str = "rest";

/// Marker selection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerConfig {
    /// Markers kept per cluster.
    pub top_n: usize,
    /// Leading markers per cluster that are tested.
    pub tested_per_cluster: usize,
    /// Markers per cluster contributed to the heatmap.
    pub heatmap_per_cluster: usize,
    /// Maximum heatmap genes overall.
    pub heatmap_max_genes: usize,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            top_n: 20,
            tested_per_cluster: 10,
            heatmap_per_cluster: 5,
            heatmap_max_genes: 50,
        }
    }
}

/// Markers per cluster plus the combined test table.
#[derive(Debug, Clone)]
pub struct MarkerResult {
    /// Cluster index → markers ordered by fold change, descending.
    pub markers: BTreeMap<usize, Vec<String>>,
    /// Tests of the leading markers of every cluster, BH-corrected together.
    pub table: DeTable,
}

impl MarkerResult {
    /// Heatmap genes: the leading markers of each cluster in ascending
    /// cluster order, de-duplicated and capped, with their expression per cell.
    pub fn heatmap(&self, norm: &NormalizedMatrix, config: &MarkerConfig) -> MarkerHeatmap {
        let index = norm.feature_index();
        let mut seen = HashSet::new();
        let genes: Vec<String> = self
            .markers
            .values()
            .flat_map(|genes| genes.iter().take(config.heatmap_per_cluster))
            .filter(|g| index.contains_key(g.as_str()) && seen.insert(g.as_str()))
            .take(config.heatmap_max_genes)
            .cloned()
            .collect();

        let rows: Vec<usize> = genes.iter().map(|g| index[g.as_str()]).collect();
        let expression = (0..norm.n_samples())
            .map(|cell| rows.iter().map(|&i| norm.get(i, cell)).collect())
            .collect();

        MarkerHeatmap { genes, expression }
    }
}

/// Rank features by `cluster mean - rest mean` for every cluster with at
/// least two members and two non-members, keep the top markers, and test
/// the leading ones against the rest.
pub fn find_markers(
    norm: &NormalizedMatrix,
    assignment: &GroupAssignment,
    config: &MarkerConfig,
) -> Result<MarkerResult> {
    if assignment.labels() != norm.sample_ids.as_slice() {
        return Err(AnalysisError::SampleMismatch(
            "cluster assignment does not match the matrix samples".to_string(),
        ));
    }

    let n = norm.n_samples();
    let mut clusters = assignment
        .distinct_groups()
        .into_iter()
        .map(|c| match c.parse::<usize>() {
            Ok(index) => Ok((index, c)),
            Err(_) => Err(AnalysisError::InvalidParameter(format!(
                "cluster id '{}' is not a cluster index",
                c
            ))),
        })
        .collect::<Result<Vec<_>>>()?;
    clusters.sort_unstable_by_key(|(index, _)| *index);

    let mut markers = BTreeMap::new();
    let mut records = Vec::new();
    let mut n_failed_tests = 0;

    for (index, cluster) in &clusters {
        let members = assignment.indices_of(cluster);
        let member_set: HashSet<usize> = members.iter().copied().collect();
        let rest: Vec<usize> = (0..n).filter(|j| !member_set.contains(j)).collect();
        if members.len() < MIN_GROUP_SIZE || rest.len() < MIN_GROUP_SIZE {
            debug!(
                "Cluster {}: {} members, {} others; no markers",
                cluster,
                members.len(),
                rest.len()
            );
            continue;
        }

        let stats: Vec<(f64, f64)> = (0..norm.n_features())
            .into_par_iter()
            .map(|i| (mean_at(norm, i, &members), mean_at(norm, i, &rest)))
            .collect();

        let mut ranked: Vec<usize> = (0..stats.len()).collect();
        ranked.sort_by(|&a, &b| {
            let fa = stats[a].0 - stats[a].1;
            let fb = stats[b].0 - stats[b].1;
            fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(config.top_n);

        for &i in ranked.iter().take(config.tested_per_cluster) {
            let outcome = welch_t_test(&norm.row_at(i, &rest), &norm.row_at(i, &members));
            if outcome.is_failed() {
                n_failed_tests += 1;
            }
            let (mean_cluster, mean_rest) = stats[i];
            records.push(DeRecord {
                gene: norm.feature_ids[i].clone(),
                log2fc: mean_cluster - mean_rest,
                pvalue: outcome.p_value(),
                padj: f64::NAN,
                group_a: REST.to_string(),
                group_b: cluster.clone(),
                cluster: Some(cluster.clone()),
                statistic: outcome.statistic(),
                mean_a: mean_rest,
                mean_b: mean_cluster,
            });
        }

        markers.insert(
            *index,
            ranked.iter().map(|&i| norm.feature_ids[i].clone()).collect::<Vec<_>>(),
        );
    }

    let correction_fallback = if records.is_empty() {
        None
    } else {
        adjust_and_sort(&mut records)
    };

    info!(
        "Markers found for {} of {} clusters ({} tests)",
        markers.len(),
        clusters.len(),
        records.len()
    );

    Ok(MarkerResult {
        markers,
        table: DeTable {
            records,
            n_failed_tests,
            correction_fallback,
        },
    })
}

fn mean_at(norm: &NormalizedMatrix, feature: usize, samples: &[usize]) -> f64 {
    samples.iter().map(|&j| norm.get(feature, j)).sum::<f64>() / samples.len() as f64
}
