//! Error types for the harness
//!
//! Only [`HarnessError`] aborts a batch. Store and prompt errors fail the
//! job they occurred in and are recorded in its result.

use std::path::PathBuf;
use sweep_core::IdentifierError;
use thiserror::Error;

/// Fatal preconditions of a batch run
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A requested model, task or technique is malformed
    #[error(transparent)]
    InvalidIdentifier(#[from] IdentifierError),

    /// A requested model has no registered backend
    #[error("unknown model {model:?}; choose from: {known}")]
    UnknownModel { model: String, known: String },

    /// The expansion produced no jobs
    #[error("nothing to run: {0} list is empty")]
    EmptyBatch(&'static str),

    /// The output directory could not be created, so no job can make progress
    #[error("cannot create output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Artifact store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid metadata in {}: {source}", .path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

/// Prompt construction failures
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("failed to read {kind} prompt {}: {source}", .path.display())]
    Read {
        kind: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{kind} prompt {} is empty", .path.display())]
    Empty { kind: &'static str, path: PathBuf },
}
