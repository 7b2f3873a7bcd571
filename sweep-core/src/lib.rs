//! Sweep Core
//!
//! Core types for the Sweep experiment harness.
//!
//! This crate contains:
//! - Job identity: the validated (model, task, technique) triple and the
//!   artifact path derived from it
//! - Job outcomes and the per-invocation run summary
//!
//! Nothing here touches the filesystem or the network.

pub mod domain;
pub mod error;

pub use domain::job::{ARTIFACT_EXTENSION, BatchId, JobSpec, PATH_SEPARATOR, output_dir};
pub use domain::result::{ErrorKind, JobError, JobResult, JobStatus, Outcome, Usage};
pub use domain::summary::RunSummary;
pub use error::IdentifierError;
