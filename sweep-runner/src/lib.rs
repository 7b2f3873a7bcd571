//! Sweep Runner
//!
//! Executes experiment batches: every (model, task, technique) combination
//! becomes one job that is generated at most once and written to a
//! deterministic artifact path.
//!
//! Layers, from the bottom up:
//! - [`repository`]: the artifact store on disk
//! - [`service`]: prompt construction and single-job execution with retries
//! - [`scheduler`]: batch expansion and the worker pool

pub mod config;
pub mod error;
pub mod repository;
pub mod scheduler;
pub mod service;

pub use config::Config;
pub use error::{HarnessError, PromptError, StoreError};
pub use repository::{ArtifactStore, FsArtifactStore, JobMeta};
pub use scheduler::{BatchRequest, BatchScheduler, NoProgress, ProgressSink};
pub use service::{ExecutorSettings, FsPromptSource, JobExecutor, PromptSource, RetryPolicy};
