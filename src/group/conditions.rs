//! Condition inference from free-text sample metadata.
//!
//! Each sample's title and characteristics are scanned against two keyword
//! families, control first, then treated. The assignment is accepted only if
//! both families matched and each has at least two samples.

use crate::data::{GroupAssignment, SampleMetadata};
use crate::policy::MIN_GROUP_SIZE;
use log::{debug, info, warn};
use regex::Regex;
use std::sync::OnceLock;

/// Label of the reference group.
pub const CONTROL: &str = "control";

/// Label of the comparison group.
pub const TREATED: &str = "treated";

static FAMILIES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();

fn families() -> &'static [(Regex, &'static str)] {
    FAMILIES.get_or_init(|| {
        vec![
            (
                Regex::new(r"\bcontrol\b|\bnormal\b|\bhealthy\b|\bwild.?type\b|\bwt\b")
                    .expect("control regex must compile"),
                CONTROL,
            ),
            (
                Regex::new(
                    r"\btreat\w*\b|\bdisease\b|\btumou?r\b|\bcancer\b|\bknock.?out\b|\bko\b|\bmutant\b",
                )
                .expect("treated regex must compile"),
                TREATED,
            ),
        ]
    })
}

/// Condition label for a piece of text, first matching family wins.
pub fn classify_text(text: &str) -> Option<&'static str> {
    let text = text.to_lowercase();
    families()
        .iter()
        .find(|(re, _)| re.is_match(&text))
        .map(|&(_, label)| label)
}

/// Result of condition inference.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionInference {
    /// Exactly two conditions with enough samples each.
    Inferred(GroupAssignment),
    /// No usable two-group split; differential expression is skipped.
    Ambiguous {
        /// Why no assignment was made.
        reason: String,
    },
}

impl ConditionInference {
    /// The assignment, if inference succeeded.
    pub fn assignment(&self) -> Option<&GroupAssignment> {
        match self {
            ConditionInference::Inferred(a) => Some(a),
            ConditionInference::Ambiguous { .. } => None,
        }
    }
}

/// Infer control/treated conditions for the given samples.
///
/// Samples without metadata or without a keyword match stay unassigned.
pub fn infer_conditions(sample_ids: &[String], metadata: &SampleMetadata) -> ConditionInference {
    let groups: Vec<Option<String>> = sample_ids
        .iter()
        .map(|id| {
            metadata
                .sample(id)
                .and_then(|record| classify_text(&record.text()))
                .map(String::from)
        })
        .collect();

    let assignment = match GroupAssignment::new(sample_ids.to_vec(), groups) {
        Some(a) => a,
        None => {
            return ConditionInference::Ambiguous {
                reason: "sample and group counts differ".to_string(),
            }
        }
    };
    debug!(
        "Condition keywords matched {} of {} samples",
        assignment.n_assigned(),
        assignment.len()
    );

    let sizes = assignment.group_sizes();
    let reason = if sizes.len() != 2 {
        Some(format!(
            "found {} condition group(s), need exactly 2",
            sizes.len()
        ))
    } else {
        sizes
            .iter()
            .find(|(_, &n)| n < MIN_GROUP_SIZE)
            .map(|(label, n)| format!("group '{}' has {} sample(s), need {}", label, n, MIN_GROUP_SIZE))
    };

    match reason {
        Some(reason) => {
            warn!("Condition inference: {}; skipping differential expression", reason);
            ConditionInference::Ambiguous { reason }
        }
        None => {
            info!(
                "Inferred conditions: {} {}, {} {}",
                sizes.get(CONTROL).copied().unwrap_or(0),
                CONTROL,
                sizes.get(TREATED).copied().unwrap_or(0),
                TREATED
            );
            ConditionInference::Inferred(assignment)
        }
    }
}
