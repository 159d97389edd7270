//! Running one analysis per job with status reporting, and a bounded pool
//! that runs several jobs at once.

use crate::data::{AnalysisResult, ExpressionMatrix, SampleMetadata};
use crate::error::{AnalysisError, Result};
use crate::pipeline::Analyzer;
use crate::worker::progress::{JobStatus, ProgressSink, StatusUpdate};
use log::{error, info, warn};
use rayon::prelude::*;
use regex::Regex;
use std::sync::{Arc, OnceLock};

static ACCESSION: OnceLock<Regex> = OnceLock::new();

fn accession_pattern() -> &'static Regex {
    ACCESSION.get_or_init(|| Regex::new(r"^GSE\d+$").expect("accession regex must compile"))
}

/// Whether `accession` is a GEO series accession such as `GSE12345`.
pub fn is_valid_accession(accession: &str) -> bool {
    accession_pattern().is_match(accession)
}

/// A downloaded dataset waiting to be analyzed.
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub job_id: String,
    pub accession: String,
    pub matrix: ExpressionMatrix,
    pub metadata: SampleMetadata,
}

impl AnalysisJob {
    /// Create a job, rejecting malformed accessions.
    pub fn new(
        job_id: impl Into<String>,
        accession: impl Into<String>,
        matrix: ExpressionMatrix,
        metadata: SampleMetadata,
    ) -> Result<Self> {
        let accession = accession.into();
        if !is_valid_accession(&accession) {
            return Err(AnalysisError::InvalidParameter(format!(
                "'{}' is not a GEO series accession (expected GSE followed by digits)",
                accession
            )));
        }
        Ok(Self {
            job_id: job_id.into(),
            accession,
            matrix,
            metadata,
        })
    }
}

/// Runs one pipeline execution per job and reports progress at stage
/// boundaries.
#[derive(Clone)]
pub struct JobRunner {
    analyzer: Analyzer,
    sink: Arc<dyn ProgressSink>,
}

impl JobRunner {
    pub fn new(analyzer: Analyzer, sink: Arc<dyn ProgressSink>) -> Self {
        Self { analyzer, sink }
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    /// Send an update; a failed delivery is logged and otherwise ignored.
    pub fn report(&self, job_id: &str, status: JobStatus, progress: u8, message: impl Into<String>) {
        let update = StatusUpdate::new(job_id, status, progress).with_message(message);
        if let Err(e) = self.sink.report(&update) {
            warn!("Status update for job {} not delivered: {}", job_id, e);
        }
    }

    /// Analyze one job to completion or failure.
    ///
    /// A failure is reported with progress 0 and returned. Input errors carry
    /// their message unchanged, since it is shown to the user.
    pub fn run(&self, job: &AnalysisJob) -> Result<AnalysisResult> {
        let id = job.job_id.as_str();
        info!("Job {}: analyzing {}", id, job.accession);

        self.report(id, JobStatus::Analyzing, 25, "Detecting data type");
        let detection = self.analyzer.detect(&job.matrix, &job.metadata);
        let data_type = self.analyzer.data_type(&detection);
        self.report(
            id,
            JobStatus::Analyzing,
            35,
            format!("Running {} analysis", data_type),
        );

        match self.analyzer.run_as(data_type, &job.matrix, &job.metadata) {
            Ok(result) => {
                self.report(id, JobStatus::Analyzing, 75, "Summarizing results");
                info!("Job {}:\n{}", id, result);
                self.report(id, JobStatus::Analyzing, 90, "Finalizing");
                self.report(id, JobStatus::Completed, 100, "Analysis complete");
                Ok(result)
            }
            Err(e) => {
                let message = if e.is_input_error() {
                    e.to_string()
                } else {
                    format!("Analysis failed: {}", e)
                };
                error!("Job {} failed: {}", id, message);
                self.report(id, JobStatus::Failed, 0, message);
                Err(e)
            }
        }
    }
}

/// Runs jobs on a fixed number of worker threads.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    runner: JobRunner,
}

impl WorkerPool {
    /// Create a pool with `n_workers` threads.
    pub fn new(runner: JobRunner, n_workers: usize) -> Result<Self> {
        if n_workers == 0 {
            return Err(AnalysisError::InvalidParameter(
                "worker pool needs at least one thread".to_string(),
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_workers)
            .thread_name(|i| format!("geolyze-worker-{}", i))
            .build()
            .map_err(|e| AnalysisError::Pipeline(e.to_string()))?;
        Ok(Self { pool, runner })
    }

    /// Create a pool sized by the analyzer's `max_concurrent_jobs`.
    pub fn from_config(runner: JobRunner) -> Result<Self> {
        let n_workers = runner.analyzer().config().max_concurrent_jobs;
        Self::new(runner, n_workers)
    }

    pub fn n_workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run every job, returning `(job_id, result)` in submission order.
    pub fn run_all(&self, jobs: Vec<AnalysisJob>) -> Vec<(String, Result<AnalysisResult>)> {
        for job in &jobs {
            self.runner
                .report(&job.job_id, JobStatus::Pending, 0, "Queued for analysis");
        }
        let runner = &self.runner;
        self.pool.install(|| {
            jobs.into_par_iter()
                .map(|job| {
                    let result = runner.run(&job);
                    (job.job_id, result)
                })
                .collect()
        })
    }
}
