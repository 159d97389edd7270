//! Job orchestration around the pipelines: status reporting, accession
//! validation and a bounded worker pool.
//!
//! Dataset download, persistence and the HTTP front end live outside this
//! crate; they hand an [`AnalysisJob`] in and consume [`StatusUpdate`]s and
//! the returned [`AnalysisResult`](crate::data::AnalysisResult).

pub mod job;
pub mod progress;

pub use job::{is_valid_accession, AnalysisJob, JobRunner, WorkerPool};
pub use progress::{JobStatus, LoggingSink, MemorySink, ProgressSink, StatusUpdate};
