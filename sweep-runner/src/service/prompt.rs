//! Prompt construction
//!
//! The technique selects the system prompt and the task selects the user
//! message. How those texts are authored is outside the harness; it only
//! loads them.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use sweep_core::JobSpec;

use crate::error::PromptError;

/// The two texts sent to the backend for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Builds the prompt for a job
#[async_trait]
pub trait PromptSource: Send + Sync {
    async fn build(&self, spec: &JobSpec) -> Result<Prompt, PromptError>;
}

/// Reads `<prompts_dir>/<technique>.md` and `<tasks_dir>/<task>.md`
#[derive(Debug, Clone)]
pub struct FsPromptSource {
    prompts_dir: PathBuf,
    tasks_dir: PathBuf,
}

impl FsPromptSource {
    pub fn new(prompts_dir: impl Into<PathBuf>, tasks_dir: impl Into<PathBuf>) -> Self {
        Self {
            prompts_dir: prompts_dir.into(),
            tasks_dir: tasks_dir.into(),
        }
    }
}

async fn load(kind: &'static str, path: PathBuf) -> Result<String, PromptError> {
    let text = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| PromptError::Read {
            kind,
            path: path.clone(),
            source,
        })?;
    Ok(text.trim().to_string())
}

fn markdown(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.md"))
}

#[async_trait]
impl PromptSource for FsPromptSource {
    async fn build(&self, spec: &JobSpec) -> Result<Prompt, PromptError> {
        let system = load("system", markdown(&self.prompts_dir, spec.technique())).await?;

        let user_path = markdown(&self.tasks_dir, spec.task());
        let user = load("task", user_path.clone()).await?;
        if user.is_empty() {
            return Err(PromptError::Empty {
                kind: "task",
                path: user_path,
            });
        }

        Ok(Prompt { system, user })
    }
}
