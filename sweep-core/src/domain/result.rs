//! Job outcome types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::job::JobSpec;

/// Final status of one job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Output was generated and written
    Success,
    /// Generation or the write failed
    Failed,
    /// A prior artifact already existed; nothing was regenerated
    Skipped,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Success => write!(f, "Success"),
            JobStatus::Failed => write!(f, "Failed"),
            JobStatus::Skipped => write!(f, "Skipped"),
        }
    }
}

/// Why a job failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The backend did not answer within the per-attempt timeout
    Timeout,
    /// The backend rejected the request
    Backend,
    /// Retryable backend errors persisted past the last attempt
    Transient,
    /// Writing the artifact failed
    Io,
    /// The prompt for the job could not be built
    Prompt,
    /// The batch was cancelled before this job was dispatched
    Cancelled,
    /// The job's task panicked or its worker stopped unexpectedly
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Backend => "BackendError",
            ErrorKind::Transient => "TransientError",
            ErrorKind::Io => "IOError",
            ErrorKind::Prompt => "PromptError",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Internal => "InternalError",
        };
        f.write_str(name)
    }
}

/// Failure details carried inside a [`JobResult`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
    /// Backend calls made before giving up (0 if none were made)
    pub attempts: u32,
}

impl JobError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, attempts: u32) -> Self {
        Self {
            kind,
            message: message.into(),
            attempts,
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Token usage reported by the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

impl Add for Usage {
    type Output = Usage;

    fn add(self, rhs: Usage) -> Usage {
        Usage {
            input_tokens: self.input_tokens + rhs.input_tokens,
            output_tokens: self.output_tokens + rhs.output_tokens,
        }
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Usage) {
        *self = *self + rhs;
    }
}

/// What happened to a job
///
/// Encodes the status invariants: only a success has a path and a line
/// count, only a failure has an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { path: PathBuf, output_lines: usize },
    Failed(JobError),
    Skipped,
}

/// Outcome of executing one [`JobSpec`]
///
/// Created exactly once per job by the executor and never mutated.
#[derive(Debug, Clone)]
pub struct JobResult {
    spec: JobSpec,
    duration: Duration,
    usage: Option<Usage>,
    outcome: Outcome,
}

impl JobResult {
    pub fn succeeded(
        spec: JobSpec,
        duration: Duration,
        path: PathBuf,
        output_lines: usize,
        usage: Option<Usage>,
    ) -> Self {
        Self {
            spec,
            duration,
            usage,
            outcome: Outcome::Success { path, output_lines },
        }
    }

    pub fn failed(spec: JobSpec, duration: Duration, error: JobError) -> Self {
        Self {
            spec,
            duration,
            usage: None,
            outcome: Outcome::Failed(error),
        }
    }

    pub fn skipped(spec: JobSpec, duration: Duration) -> Self {
        Self {
            spec,
            duration,
            usage: None,
            outcome: Outcome::Skipped,
        }
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    /// Wall-clock time spent on the job, including retries
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn usage(&self) -> Option<Usage> {
        self.usage
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn status(&self) -> JobStatus {
        match self.outcome {
            Outcome::Success { .. } => JobStatus::Success,
            Outcome::Failed(_) => JobStatus::Failed,
            Outcome::Skipped => JobStatus::Skipped,
        }
    }

    /// Artifact location, set only on success
    pub fn path(&self) -> Option<&Path> {
        match &self.outcome {
            Outcome::Success { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Lines written, set only on success
    pub fn output_lines(&self) -> Option<usize> {
        match self.outcome {
            Outcome::Success { output_lines, .. } => Some(output_lines),
            _ => None,
        }
    }

    /// Failure details, set only on failure
    pub fn error(&self) -> Option<&JobError> {
        match &self.outcome {
            Outcome::Failed(error) => Some(error),
            _ => None,
        }
    }
}
