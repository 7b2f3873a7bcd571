//! Sweep CLI
//!
//! The `run` command: executes one experiment job, or a batch of
//! model × task × technique combinations, and prints a report.
//!
//! ```text
//! run <model> <task> <technique>
//! run --batch <models...> --tasks <...> --techniques <...> [--concurrency N]
//! ```
//!
//! Exits 0 when every job succeeded or was skipped, 1 otherwise.

mod config;
mod progress;
mod report;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use sweep_client::{MessagesClient, ModelRegistry};
use sweep_runner::{BatchRequest, BatchScheduler, FsArtifactStore, FsPromptSource, JobExecutor};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::progress::ConsoleProgress;

#[derive(Parser, Debug)]
#[command(name = "run")]
#[command(about = "Run generation experiments, one artifact per job", long_about = None)]
struct Cli {
    /// Model, task and technique of a single job
    #[arg(
        num_args = 3,
        value_names = ["MODEL", "TASK", "TECHNIQUE"],
        required_unless_present = "batch",
        conflicts_with = "batch"
    )]
    job: Vec<String>,

    /// Models to run (batch mode)
    #[arg(long, num_args = 1.., value_name = "MODELS", requires_all = ["tasks", "techniques"])]
    batch: Option<Vec<String>>,

    /// Tasks to run (batch mode)
    #[arg(long, num_args = 1.., requires = "batch")]
    tasks: Vec<String>,

    /// Techniques to run (batch mode)
    #[arg(long, num_args = 1.., requires = "batch")]
    techniques: Vec<String>,

    /// Number of jobs run concurrently [default: 5]
    #[arg(long, env = "SWEEP_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Per-attempt backend timeout in seconds [default: 300]
    #[arg(long, value_name = "SECONDS", env = "SWEEP_TIMEOUT")]
    timeout: Option<u64>,

    /// Root directory for artifacts [default: output]
    #[arg(long, env = "SWEEP_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Write artifacts under <output-dir>/<batch-id>
    #[arg(long, env = "SWEEP_BATCH")]
    batch_id: Option<String>,

    /// Directory of <technique>.md system prompts [default: prompts]
    #[arg(long, env = "SWEEP_PROMPTS_DIR")]
    prompts_dir: Option<PathBuf>,

    /// Directory of <task>.md user messages [default: tasks]
    #[arg(long, env = "SWEEP_TASKS_DIR")]
    tasks_dir: Option<PathBuf>,

    /// Backend base URL [default: https://api.anthropic.com]
    #[arg(long, env = "SWEEP_API_URL")]
    api_url: Option<String>,

    /// Backend API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

impl Cli {
    fn request(&self) -> BatchRequest {
        match (&self.batch, self.job.as_slice()) {
            (Some(models), _) => BatchRequest::new(
                models.clone(),
                self.tasks.clone(),
                self.techniques.clone(),
            ),
            (None, [model, task, technique]) => BatchRequest::single(model, task, technique),
            // Unreachable through clap; expands to an empty-batch error.
            (None, _) => BatchRequest::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sweep_runner=info,sweep_client=info,sweep_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let code = run(cli).await?;

    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let config = config::load(&cli)?;
    let api_key = cli
        .api_key
        .clone()
        .context("No API key: set ANTHROPIC_API_KEY or pass --api-key")?;

    info!(
        "Loaded configuration: output_dir={}, concurrency={}, timeout={:?}",
        config.output_dir().display(),
        config.concurrency,
        config.timeout
    );

    let backend = Arc::new(MessagesClient::new(config.api_url.clone(), api_key));
    let registry = ModelRegistry::with_defaults(backend);
    let store = FsArtifactStore::new(&config.output_root, config.batch.as_ref());
    let prompts = FsPromptSource::new(&config.prompts_dir, &config.tasks_dir);

    let executor = JobExecutor::new(
        Arc::new(registry),
        Arc::new(store),
        Arc::new(prompts),
        config.executor_settings(),
    );
    let scheduler = BatchScheduler::new(Arc::new(executor), config.concurrency)
        .with_progress(Arc::new(ConsoleProgress));

    let summary = scheduler
        .run_until(&cli.request(), shutdown_on_ctrl_c())
        .await
        .context("Batch could not start")?;

    report::print(&summary);

    Ok(summary.exit_code())
}

/// Exit status after a second Ctrl-C (128 + SIGINT)
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// What to do on the `count`-th Ctrl-C
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    /// Stop dispatching and let running jobs finish
    Drain,
    /// Exit immediately
    Abort,
}

fn on_interrupt(count: u32, shutdown: &watch::Sender<bool>) -> Interrupt {
    if count == 1 {
        shutdown.send_replace(true);
        Interrupt::Drain
    } else {
        Interrupt::Abort
    }
}

/// Flips to true on the first Ctrl-C; a second Ctrl-C exits the process
///
/// Exiting mid-job is safe for the output directory: artifacts are only
/// ever renamed into place once complete.
fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        let mut count = 0;
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Unable to listen for Ctrl-C: {}", e);
                break;
            }

            count += 1;
            match on_interrupt(count, &tx) {
                Interrupt::Drain => warn!(
                    "Interrupted: no new jobs will start, waiting for running jobs \
                     (Ctrl-C again to exit now)"
                ),
                Interrupt::Abort => {
                    warn!("Interrupted twice, exiting without waiting for running jobs");
                    std::process::exit(INTERRUPTED_EXIT_CODE);
                }
            }
        }
    });

    rx
}
