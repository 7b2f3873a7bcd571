//! Execution service
//!
//! Runs exactly one job end to end and produces exactly one result:
//! - Skips the job if its artifact already exists (no backend call)
//! - Builds the prompt and calls the backend, retrying transient errors
//!   with jittered exponential backoff
//! - Writes the artifact and its metadata sidecar
//!
//! Failures are returned as data inside the [`JobResult`]; nothing here
//! aborts the batch.

use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sweep_client::{GenerateError, Generation, GenerationRequest, ModelEntry, ModelRegistry};
use sweep_core::{ErrorKind, JobError, JobResult, JobSpec};
use tracing::{debug, info, warn};

use crate::repository::{ArtifactStore, JobMeta};
use crate::service::PromptSource;

/// Retry schedule for transient backend errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total backend calls allowed per job, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failure, before jitter
    ///
    /// `base * 2^(attempt - 1)`, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Backoff plus uniform jitter of up to half the backoff
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = self.backoff(attempt);
        let max_jitter = (backoff.as_millis() / 2) as u64;
        let jitter = if max_jitter == 0 {
            0
        } else {
            rand::rng().random_range(0..=max_jitter)
        };
        backoff + Duration::from_millis(jitter)
    }
}

/// Per-job execution settings
#[derive(Debug, Clone, Copy)]
pub struct ExecutorSettings {
    /// Timeout for each backend call
    pub timeout: Duration,
    pub max_tokens: u32,
    pub retry: RetryPolicy,
}

/// Runs single jobs against the registered backends
pub struct JobExecutor {
    registry: Arc<ModelRegistry>,
    store: Arc<dyn ArtifactStore>,
    prompts: Arc<dyn PromptSource>,
    settings: ExecutorSettings,
}

impl JobExecutor {
    pub fn new(
        registry: Arc<ModelRegistry>,
        store: Arc<dyn ArtifactStore>,
        prompts: Arc<dyn PromptSource>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            registry,
            store,
            prompts,
            settings,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn store(&self) -> &dyn ArtifactStore {
        self.store.as_ref()
    }

    /// Executes a job
    ///
    /// Duration covers the whole attempt, retries included, whatever the
    /// outcome.
    pub async fn execute(&self, spec: JobSpec) -> JobResult {
        let started = Instant::now();

        if self.store.exists(&spec).await {
            self.log_previous_run(&spec).await;
            return JobResult::skipped(spec, started.elapsed());
        }

        let Some(entry) = self.registry.resolve(spec.model()) else {
            let message = format!("no backend registered for model {:?}", spec.model());
            return fail(spec, started, ErrorKind::Backend, message, 0);
        };

        let prompt = match self.prompts.build(&spec).await {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(job = %spec, "Failed to build prompt: {}", e);
                return fail(spec, started, ErrorKind::Prompt, e.to_string(), 0);
            }
        };

        let request = GenerationRequest {
            model_id: entry.model_id.clone(),
            system: prompt.system,
            user: prompt.user,
            max_tokens: self.settings.max_tokens,
        };

        info!(job = %spec, model_id = %request.model_id, "Starting generation");

        let (generation, attempts) = match self.generate_with_retry(entry, &request, &spec).await {
            Ok(done) => done,
            Err((e, attempts)) => {
                warn!(job = %spec, attempts, "Generation failed: {}", e);
                return fail(spec, started, e.kind(), e.to_string(), attempts);
            }
        };

        if generation.text.trim().is_empty() {
            let message = "backend returned no text".to_string();
            return fail(spec, started, ErrorKind::Backend, message, attempts);
        }

        let written = match self.store.write(&spec, &generation.text).await {
            Ok(written) => written,
            Err(e) => {
                warn!(job = %spec, "Failed to write artifact: {}", e);
                return fail(spec, started, ErrorKind::Io, e.to_string(), attempts);
            }
        };

        let result = JobResult::succeeded(
            spec,
            started.elapsed(),
            written.path,
            written.line_count,
            generation.usage,
        );

        if let Err(e) = self
            .store
            .write_meta(result.spec(), &JobMeta::from_result(&result))
            .await
        {
            warn!(job = %result.spec(), "Failed to write metadata: {}", e);
        }

        result
    }

    /// Calls the backend, retrying only transient errors
    ///
    /// Returns the generation and the number of calls made, or the last
    /// error and the number of calls made.
    async fn generate_with_retry(
        &self,
        entry: &ModelEntry,
        request: &GenerationRequest,
        spec: &JobSpec,
    ) -> Result<(Generation, u32), (GenerateError, u32)> {
        let policy = self.settings.retry;
        let mut attempt = 0;

        loop {
            attempt += 1;

            match entry.client.generate(request, self.settings.timeout).await {
                Ok(generation) => {
                    if attempt > 1 {
                        info!(job = %spec, "Generation succeeded after {} attempt(s)", attempt);
                    }
                    return Ok((generation, attempt));
                }
                Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        job = %spec,
                        "Transient backend error (attempt {}/{}): {}",
                        attempt, policy.max_attempts, e
                    );
                    warn!("Retrying in {:?}...", delay);

                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err((e, attempt)),
            }
        }
    }

    async fn log_previous_run(&self, spec: &JobSpec) {
        match self.store.read_meta(spec).await {
            Ok(Some(meta)) => debug!(
                job = %spec,
                "Artifact exists (generated in {:.0}s, {} line(s)), skipping",
                meta.duration_secs,
                meta.output_lines.unwrap_or_default()
            ),
            Ok(None) => debug!(job = %spec, "Artifact exists, skipping"),
            Err(e) => debug!(job = %spec, "Artifact exists, skipping (metadata unreadable: {})", e),
        }
    }
}

fn fail(spec: JobSpec, started: Instant, kind: ErrorKind, message: String, attempts: u32) -> JobResult {
    JobResult::failed(spec, started.elapsed(), JobError::new(kind, message, attempts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PromptError;
    use crate::repository::FsArtifactStore;
    use crate::service::Prompt;
    use async_trait::async_trait;
    use std::path::Path;
    use sweep_client::testing::{ScriptedClient, Step};
    use sweep_core::{JobStatus, Outcome};
    use tempfile::{TempDir, tempdir};

    /// Uses the task id as the user message and the technique as the system prompt
    struct EchoPrompts;

    #[async_trait]
    impl PromptSource for EchoPrompts {
        async fn build(&self, spec: &JobSpec) -> Result<Prompt, PromptError> {
            Ok(Prompt {
                system: spec.technique().to_string(),
                user: spec.task().to_string(),
            })
        }
    }

    struct BrokenPrompts;

    #[async_trait]
    impl PromptSource for BrokenPrompts {
        async fn build(&self, spec: &JobSpec) -> Result<Prompt, PromptError> {
            Err(PromptError::Empty {
                kind: "task",
                path: Path::new("tasks").join(format!("{}.md", spec.task())),
            })
        }
    }

    fn settings() -> ExecutorSettings {
        ExecutorSettings {
            timeout: Duration::from_millis(200),
            max_tokens: 64,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(4),
            },
        }
    }

    async fn executor_with(
        client: Arc<ScriptedClient>,
        prompts: Arc<dyn PromptSource>,
    ) -> (JobExecutor, TempDir) {
        let root = tempdir().unwrap();
        let store = FsArtifactStore::new(root.path(), None);
        store.ensure_dir().await.unwrap();

        let mut registry = ModelRegistry::new();
        registry.register("sonnet", "claude-sonnet-4-5", client);

        let executor = JobExecutor::new(Arc::new(registry), Arc::new(store), prompts, settings());
        (executor, root)
    }

    fn spec() -> JobSpec {
        JobSpec::new("sonnet", "task_H", "L8_generative_v2").unwrap()
    }

    #[tokio::test]
    async fn test_single_job_success() {
        let client = Arc::new(ScriptedClient::replying("hello\nworld\n"));
        let (executor, root) = executor_with(Arc::clone(&client), Arc::new(EchoPrompts)).await;

        let result = executor.execute(spec()).await;

        assert_eq!(result.status(), JobStatus::Success);
        assert_eq!(result.output_lines(), Some(2));
        assert_eq!(
            result.path(),
            Some(root.path().join("sonnet+L8_generative_v2+task_H.md").as_path())
        );
        assert!(result.error().is_none());
        assert_eq!(client.calls(), 1);

        let request = &client.requests()[0];
        assert_eq!(request.model_id, "claude-sonnet-4-5");
        assert_eq!(request.system, "L8_generative_v2");
        assert_eq!(request.user, "task_H");
        assert_eq!(request.max_tokens, 64);

        let meta = executor.store().read_meta(&spec()).await.unwrap().unwrap();
        assert_eq!(meta.status, JobStatus::Success);
        assert_eq!(meta.output_lines, Some(2));
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let client = Arc::new(ScriptedClient::with_script([
            Step::Fail(GenerateError::Transient("rate limited".to_string())),
            Step::Fail(GenerateError::Transient("connection reset".to_string())),
            Step::Reply("final\ntext\n".to_string()),
        ]));
        let (executor, root) = executor_with(Arc::clone(&client), Arc::new(EchoPrompts)).await;

        let result = executor.execute(spec()).await;

        assert_eq!(result.status(), JobStatus::Success);
        assert_eq!(client.calls(), 3);
        let content =
            std::fs::read_to_string(root.path().join("sonnet+L8_generative_v2+task_H.md")).unwrap();
        assert_eq!(content, "final\ntext\n");
    }

    #[tokio::test]
    async fn test_transient_errors_exhaust_retries() {
        let client = Arc::new(ScriptedClient::with_script(
            std::iter::repeat_with(|| Step::Fail(GenerateError::Transient("busy".to_string())))
                .take(5),
        ));
        let (executor, _root) = executor_with(Arc::clone(&client), Arc::new(EchoPrompts)).await;

        let result = executor.execute(spec()).await;

        let error = result.error().unwrap();
        assert_eq!(error.kind, ErrorKind::Transient);
        assert_eq!(error.attempts, 3);
        assert_eq!(client.calls(), 3);
        assert!(!executor.store().exists(&spec()).await);
    }

    #[tokio::test]
    async fn test_timeout_is_not_retried() {
        let client = Arc::new(ScriptedClient::with_script([Step::Hang]).with_fallback("late"));
        let (executor, _root) = executor_with(Arc::clone(&client), Arc::new(EchoPrompts)).await;

        let result = executor.execute(spec()).await;

        assert_eq!(result.error().map(|e| e.kind), Some(ErrorKind::Timeout));
        assert_eq!(client.calls(), 1);
        assert!(result.duration() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_backend_error_is_not_retried() {
        let client = Arc::new(
            ScriptedClient::with_script([Step::Fail(GenerateError::from_status(
                400,
                "invalid model",
            ))])
            .with_fallback("unused"),
        );
        let (executor, _root) = executor_with(Arc::clone(&client), Arc::new(EchoPrompts)).await;

        let result = executor.execute(spec()).await;

        assert_eq!(result.error().map(|e| e.kind), Some(ErrorKind::Backend));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_existing_artifact_is_skipped() {
        let client = Arc::new(ScriptedClient::replying("new text\n"));
        let (executor, root) = executor_with(Arc::clone(&client), Arc::new(EchoPrompts)).await;
        let path = root.path().join("sonnet+L8_generative_v2+task_H.md");
        std::fs::write(&path, "old text\n").unwrap();

        let result = executor.execute(spec()).await;

        assert_eq!(result.status(), JobStatus::Skipped);
        assert_eq!(*result.outcome(), Outcome::Skipped);
        assert_eq!(client.calls(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old text\n");
    }

    #[tokio::test]
    async fn test_prompt_failure_makes_no_call() {
        let client = Arc::new(ScriptedClient::replying("x\n"));
        let (executor, _root) = executor_with(Arc::clone(&client), Arc::new(BrokenPrompts)).await;

        let result = executor.execute(spec()).await;

        let error = result.error().unwrap();
        assert_eq!(error.kind, ErrorKind::Prompt);
        assert_eq!(error.attempts, 0);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_is_io_error() {
        let client = Arc::new(ScriptedClient::replying("text\n"));
        let root = tempdir().unwrap();
        // Directory never created, so the write fails.
        let store = FsArtifactStore::new(root.path().join("absent"), None);
        let mut registry = ModelRegistry::new();
        registry.register("sonnet", "claude-sonnet-4-5", client.clone());
        let executor = JobExecutor::new(
            Arc::new(registry),
            Arc::new(store),
            Arc::new(EchoPrompts),
            settings(),
        );

        let result = executor.execute(spec()).await;

        let error = result.error().unwrap();
        assert_eq!(error.kind, ErrorKind::Io);
        assert_eq!(error.attempts, 1);
        assert!(result.path().is_none());
    }

    #[tokio::test]
    async fn test_blank_generation_is_rejected() {
        let client = Arc::new(ScriptedClient::replying("  \n"));
        let (executor, _root) = executor_with(Arc::clone(&client), Arc::new(EchoPrompts)).await;

        let result = executor.execute(spec()).await;

        assert_eq!(result.error().map(|e| e.kind), Some(ErrorKind::Backend));
        assert!(!executor.store().exists(&spec()).await);
    }

    #[tokio::test]
    async fn test_unregistered_model_fails_without_call() {
        let client = Arc::new(ScriptedClient::replying("x\n"));
        let (executor, _root) = executor_with(Arc::clone(&client), Arc::new(EchoPrompts)).await;
        let spec = JobSpec::new("opus", "task_H", "L8").unwrap();

        let result = executor.execute(spec).await;

        assert_eq!(result.error().map(|e| e.kind), Some(ErrorKind::Backend));
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
        };

        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff(4), Duration::from_secs(3));
        assert_eq!(policy.backoff(40), Duration::from_secs(3));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
        };

        for _ in 0..100 {
            let delay = policy.delay_for(2);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(300));
        }
    }
}
