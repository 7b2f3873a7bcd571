//! Run summary
//!
//! Aggregate of one scheduler invocation. Exists only to drive the printed
//! report and the process exit code; never persisted.

use std::path::{Path, PathBuf};

use super::result::{JobResult, JobStatus, Usage};

#[derive(Debug, Clone)]
pub struct RunSummary {
    output_dir: PathBuf,
    results: Vec<JobResult>,
}

impl RunSummary {
    /// Builds a summary from results already in submission order
    pub fn new(output_dir: PathBuf, results: Vec<JobResult>) -> Self {
        Self {
            output_dir,
            results,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Results in expansion order, one per job
    pub fn results(&self) -> &[JobResult] {
        &self.results
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.count(JobStatus::Success)
    }

    pub fn failed(&self) -> usize {
        self.count(JobStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(JobStatus::Skipped)
    }

    /// Failed results, in expansion order
    pub fn failures(&self) -> impl Iterator<Item = &JobResult> {
        self.results
            .iter()
            .filter(|r| r.status() == JobStatus::Failed)
    }

    /// Token usage summed over every job that reported it
    pub fn usage(&self) -> Usage {
        self.results
            .iter()
            .filter_map(JobResult::usage)
            .fold(Usage::default(), |acc, u| acc + u)
    }

    /// True when every job succeeded or was skipped
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Process exit code for scripting: 0 when nothing failed
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }

    fn count(&self, status: JobStatus) -> usize {
        self.results.iter().filter(|r| r.status() == status).count()
    }
}
