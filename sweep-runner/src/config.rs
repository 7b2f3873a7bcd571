//! Harness configuration
//!
//! Defines all configurable parameters for a batch run including the
//! output layout, worker pool size, per-attempt timeout and retry policy.

use std::path::PathBuf;
use std::time::Duration;
use sweep_core::{BatchId, output_dir};

use crate::service::{ExecutorSettings, RetryPolicy};

/// Harness configuration
///
/// Timeouts and pool size are configurable because the bottleneck is the
/// backend's own concurrency limits, which differ per account and model.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for artifacts
    pub output_root: PathBuf,

    /// Optional batch directory under `output_root`
    pub batch: Option<BatchId>,

    /// Number of concurrent workers
    pub concurrency: usize,

    /// Per-attempt backend timeout
    pub timeout: Duration,

    /// Backend calls per job before giving up on transient errors
    pub max_attempts: u32,

    /// First retry delay; doubles on every further attempt
    pub retry_base_delay: Duration,

    /// Upper bound on a single retry delay
    pub retry_max_delay: Duration,

    /// Token limit for each generation
    pub max_tokens: u32,

    /// Directory holding `<technique>.md` system prompts
    pub prompts_dir: PathBuf,

    /// Directory holding `<task>.md` user messages
    pub tasks_dir: PathBuf,

    /// Backend base URL
    pub api_url: String,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(output_root: PathBuf) -> Self {
        Self {
            output_root,
            batch: None,
            concurrency: 5,
            timeout: Duration::from_secs(300), // 5 minutes
            max_attempts: 3,
            retry_base_delay: Duration::from_secs(2),
            retry_max_delay: Duration::from_secs(30),
            max_tokens: 2048,
            prompts_dir: PathBuf::from("prompts"),
            tasks_dir: PathBuf::from("tasks"),
            api_url: "https://api.anthropic.com".to_string(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Every variable is optional:
    /// - SWEEP_OUTPUT_DIR (default: output)
    /// - SWEEP_BATCH (default: none)
    /// - SWEEP_CONCURRENCY (default: 5)
    /// - SWEEP_TIMEOUT (seconds, default: 300)
    /// - SWEEP_MAX_ATTEMPTS (default: 3)
    /// - SWEEP_MAX_TOKENS (default: 2048)
    /// - SWEEP_PROMPTS_DIR (default: prompts)
    /// - SWEEP_TASKS_DIR (default: tasks)
    /// - SWEEP_API_URL (default: https://api.anthropic.com)
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::new(
            env_var("SWEEP_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("output")),
        );

        if let Some(batch) = env_var("SWEEP_BATCH") {
            config.batch = Some(BatchId::new(batch)?);
        }

        if let Some(concurrency) = env_parse::<usize>("SWEEP_CONCURRENCY") {
            config.concurrency = concurrency;
        }

        if let Some(secs) = env_parse::<u64>("SWEEP_TIMEOUT") {
            config.timeout = Duration::from_secs(secs);
        }

        if let Some(attempts) = env_parse::<u32>("SWEEP_MAX_ATTEMPTS") {
            config.max_attempts = attempts;
        }

        if let Some(max_tokens) = env_parse::<u32>("SWEEP_MAX_TOKENS") {
            config.max_tokens = max_tokens;
        }

        if let Some(dir) = env_var("SWEEP_PROMPTS_DIR") {
            config.prompts_dir = PathBuf::from(dir);
        }

        if let Some(dir) = env_var("SWEEP_TASKS_DIR") {
            config.tasks_dir = PathBuf::from(dir);
        }

        if let Some(url) = env_var("SWEEP_API_URL") {
            config.api_url = url;
        }

        Ok(config)
    }

    /// Places artifacts in a named batch directory
    pub fn with_batch(mut self, batch: BatchId) -> Self {
        self.batch = Some(batch);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Directory that receives this run's artifacts
    pub fn output_dir(&self) -> PathBuf {
        output_dir(&self.output_root, self.batch.as_ref())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: self.retry_base_delay,
            max_delay: self.retry_max_delay,
        }
    }

    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            timeout: self.timeout,
            max_tokens: self.max_tokens,
            retry: self.retry_policy(),
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.output_root.as_os_str().is_empty() {
            anyhow::bail!("output_root cannot be empty");
        }

        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be greater than 0");
        }

        if self.timeout.is_zero() {
            anyhow::bail!("timeout must be greater than 0");
        }

        if self.max_attempts == 0 {
            anyhow::bail!("max_attempts must be greater than 0");
        }

        if self.retry_base_delay > self.retry_max_delay {
            anyhow::bail!("retry_base_delay cannot exceed retry_max_delay");
        }

        if self.max_tokens == 0 {
            anyhow::bail!("max_tokens must be greater than 0");
        }

        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            anyhow::bail!("api_url must start with http:// or https://");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(PathBuf::from("output"))
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_var(name).and_then(|s| s.parse::<T>().ok())
}
