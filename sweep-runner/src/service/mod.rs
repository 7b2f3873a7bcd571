//! Service layer
//!
//! Services contain the per-job business logic. They use the repository
//! layer for persistence and the generation client for the backend.
//!
//! Prompt construction is trait-based so tests can supply prompts without
//! touching the filesystem.

mod execution;
mod prompt;

pub use execution::{ExecutorSettings, JobExecutor, RetryPolicy};
pub use prompt::{FsPromptSource, Prompt, PromptSource};
