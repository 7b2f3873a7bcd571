//! Repository layer
//!
//! Repositories own persistence. The artifact store is the only component
//! that touches job outputs on disk and the single source of truth for
//! whether a job has already produced output.
//!
//! The store is trait-based so executor and scheduler tests can swap it.

mod artifacts;

pub use artifacts::{ArtifactStore, FsArtifactStore, JobMeta, Written};
