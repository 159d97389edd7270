//! Job status updates and the sinks that receive them.

use crate::error::{AnalysisError, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Downloading,
    Analyzing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether the job has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Downloading => "downloading",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A progress report for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub job_id: String,
    pub status: JobStatus,
    /// Percent complete, 0 to 100.
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusUpdate {
    /// Create an update; progress above 100 is clamped.
    pub fn new(job_id: impl Into<String>, status: JobStatus, progress: u8) -> Self {
        Self {
            job_id: job_id.into(),
            status,
            progress: progress.min(100),
            message: None,
        }
    }

    /// Attach a message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Receives status updates.
///
/// Delivery is best effort: callers log a failed report and carry on.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: &StatusUpdate) -> Result<()>;
}

/// Writes every update to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSink;

impl ProgressSink for LoggingSink {
    fn report(&self, update: &StatusUpdate) -> Result<()> {
        match &update.message {
            Some(message) => info!(
                "[job {}] {} {}%: {}",
                update.job_id, update.status, update.progress, message
            ),
            None => info!(
                "[job {}] {} {}%",
                update.job_id, update.status, update.progress
            ),
        }
        Ok(())
    }
}

/// Keeps every update in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    updates: Mutex<Vec<StatusUpdate>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All updates received, in order.
    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.updates
            .lock()
            .map(|updates| updates.clone())
            .unwrap_or_default()
    }

    /// Updates for one job, in order.
    pub fn history(&self, job_id: &str) -> Vec<StatusUpdate> {
        self.updates()
            .into_iter()
            .filter(|u| u.job_id == job_id)
            .collect()
    }

    /// Most recent update per job.
    pub fn latest(&self) -> HashMap<String, StatusUpdate> {
        self.updates()
            .into_iter()
            .map(|u| (u.job_id.clone(), u))
            .collect()
    }
}

impl ProgressSink for MemorySink {
    fn report(&self, update: &StatusUpdate) -> Result<()> {
        let mut updates = self
            .updates
            .lock()
            .map_err(|e| AnalysisError::StatusSink(e.to_string()))?;
        updates.push(update.clone());
        Ok(())
    }
}
