//! Batch scheduler
//!
//! Expands a batch request into jobs and runs them on a fixed pool of
//! workers pulling from a shared queue. Results are collected by job index,
//! so the summary is always in expansion order whatever the completion
//! order was.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use sweep_core::{ErrorKind, JobError, JobResult, JobSpec, RunSummary};
use tokio::sync::{mpsc, watch};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::error::{HarnessError, StoreError};
use crate::service::JobExecutor;

type JobQueue = Arc<Mutex<VecDeque<(usize, JobSpec)>>>;

/// Models, tasks and techniques to combine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchRequest {
    pub models: Vec<String>,
    pub tasks: Vec<String>,
    pub techniques: Vec<String>,
}

impl BatchRequest {
    pub fn new(models: Vec<String>, tasks: Vec<String>, techniques: Vec<String>) -> Self {
        Self {
            models,
            tasks,
            techniques,
        }
    }

    /// A batch of exactly one job
    pub fn single(
        model: impl Into<String>,
        task: impl Into<String>,
        technique: impl Into<String>,
    ) -> Self {
        Self::new(vec![model.into()], vec![task.into()], vec![technique.into()])
    }

    /// Expands the cartesian product, models outermost and techniques innermost
    ///
    /// Repeated entries in a list are dropped after their first occurrence,
    /// so no two jobs share an artifact path.
    pub fn expand(&self) -> Result<Vec<JobSpec>, HarnessError> {
        let models = unique("model", &self.models)?;
        let tasks = unique("task", &self.tasks)?;
        let techniques = unique("technique", &self.techniques)?;

        let mut jobs = Vec::with_capacity(models.len() * tasks.len() * techniques.len());
        for model in &models {
            for task in &tasks {
                for technique in &techniques {
                    jobs.push(JobSpec::new(*model, *task, *technique)?);
                }
            }
        }

        Ok(jobs)
    }
}

fn unique<'a>(kind: &'static str, values: &'a [String]) -> Result<Vec<&'a str>, HarnessError> {
    if values.is_empty() {
        return Err(HarnessError::EmptyBatch(kind));
    }

    let mut seen = BTreeSet::new();
    Ok(values
        .iter()
        .map(String::as_str)
        .filter(|v| seen.insert(*v))
        .collect())
}

/// Receives a notification as each job finishes
pub trait ProgressSink: Send + Sync {
    /// `position` counts finished jobs from 1 up to `total`
    fn job_finished(&self, position: usize, total: usize, result: &JobResult);
}

/// Discards progress notifications
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn job_finished(&self, _position: usize, _total: usize, _result: &JobResult) {}
}

/// Runs batches on a bounded worker pool
pub struct BatchScheduler {
    executor: Arc<JobExecutor>,
    concurrency: usize,
    progress: Arc<dyn ProgressSink>,
}

impl BatchScheduler {
    /// Creates a scheduler with `concurrency` workers (at least one)
    pub fn new(executor: Arc<JobExecutor>, concurrency: usize) -> Self {
        Self {
            executor,
            concurrency: concurrency.max(1),
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Runs every job of the batch to completion
    pub async fn run(&self, request: &BatchRequest) -> Result<RunSummary, HarnessError> {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        self.run_until(request, shutdown_rx).await
    }

    /// Runs the batch until it completes or `shutdown` turns true
    ///
    /// After shutdown, idle workers stop taking jobs and in-flight jobs run
    /// to completion. Jobs never started are reported as cancelled.
    ///
    /// # Errors
    /// Fails before any job starts if the request is empty or malformed,
    /// names an unregistered model, or the output directory cannot be
    /// created.
    pub async fn run_until(
        &self,
        request: &BatchRequest,
        shutdown: watch::Receiver<bool>,
    ) -> Result<RunSummary, HarnessError> {
        let jobs = request.expand()?;
        self.check_models(&jobs)?;
        self.ensure_output_dir().await?;

        let output_dir = self.executor.store().output_dir().to_path_buf();
        let total = jobs.len();
        let workers = self.concurrency.min(total);

        info!(
            "Running {} job(s) on {} worker(s) into {}",
            total,
            workers,
            output_dir.display()
        );

        let queue: JobQueue = Arc::new(Mutex::new(jobs.iter().cloned().enumerate().collect()));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel();

        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                self.spawn_worker(
                    worker,
                    Arc::clone(&queue),
                    result_tx.clone(),
                    shutdown.clone(),
                )
            })
            .collect();
        drop(result_tx);

        let mut slots: Vec<Option<JobResult>> = (0..total).map(|_| None).collect();
        let mut finished = 0;

        while let Some((index, result)) = result_rx.recv().await {
            finished += 1;
            self.progress.job_finished(finished, total, &result);
            slots[index] = Some(result);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Worker task panicked: {}", e);
            }
        }

        let cancelled = *shutdown.borrow();
        if finished < total {
            warn!("{} job(s) were not run", total - finished);
        }

        let results = jobs
            .into_iter()
            .zip(slots)
            .map(|(spec, slot)| slot.unwrap_or_else(|| not_run(spec, cancelled)))
            .collect();

        let summary = RunSummary::new(output_dir, results);
        info!(
            "Batch finished: {} succeeded, {} failed, {} skipped",
            summary.succeeded(),
            summary.failed(),
            summary.skipped()
        );

        Ok(summary)
    }

    /// Rejects models with no registered backend before any job runs
    fn check_models(&self, jobs: &[JobSpec]) -> Result<(), HarnessError> {
        let registry = self.executor.registry();
        match jobs.iter().find(|job| !registry.contains(job.model())) {
            Some(job) => Err(HarnessError::UnknownModel {
                model: job.model().to_string(),
                known: registry.aliases().join(", "),
            }),
            None => Ok(()),
        }
    }

    async fn ensure_output_dir(&self) -> Result<(), HarnessError> {
        let store = self.executor.store();
        store.ensure_dir().await.map_err(|e| match e {
            StoreError::Io { path, source, .. } => HarnessError::OutputDir { path, source },
            other => HarnessError::OutputDir {
                path: store.output_dir().to_path_buf(),
                source: std::io::Error::other(other.to_string()),
            },
        })
    }

    /// Spawns a worker that executes queued jobs until the queue drains or
    /// shutdown is requested
    fn spawn_worker(
        &self,
        worker: usize,
        queue: JobQueue,
        results: mpsc::UnboundedSender<(usize, JobResult)>,
        shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let executor = Arc::clone(&self.executor);

        tokio::spawn(async move {
            loop {
                if *shutdown.borrow() {
                    debug!(worker, "Shutdown requested, worker stopping");
                    break;
                }

                let Some((index, spec)) = next_job(&queue) else {
                    debug!(worker, "Queue drained, worker stopping");
                    break;
                };

                let result = run_isolated(worker, &executor, spec).await;

                if results.send((index, result)).is_err() {
                    break;
                }
            }
        })
    }
}

/// Runs one job in its own task so a panic fails only that job
async fn run_isolated(worker: usize, executor: &Arc<JobExecutor>, spec: JobSpec) -> JobResult {
    let started = Instant::now();
    let span = info_span!(
        "job",
        model = spec.model(),
        task = spec.task(),
        technique = spec.technique()
    );

    let task = {
        let executor = Arc::clone(executor);
        let spec = spec.clone();
        tokio::spawn(async move { executor.execute(spec).await }.instrument(span))
    };

    match task.await {
        Ok(result) => result,
        Err(e) => {
            warn!(worker, job = %spec, "Job task panicked: {}", e);
            JobResult::failed(
                spec,
                started.elapsed(),
                JobError::new(ErrorKind::Internal, format!("job task failed: {e}"), 0),
            )
        }
    }
}

fn next_job(queue: &JobQueue) -> Option<(usize, JobSpec)> {
    let mut queue = queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    queue.pop_front()
}

fn not_run(spec: JobSpec, cancelled: bool) -> JobResult {
    let error = if cancelled {
        JobError::new(ErrorKind::Cancelled, "batch cancelled before the job started", 0)
    } else {
        JobError::new(ErrorKind::Internal, "worker stopped before the job finished", 0)
    };
    JobResult::failed(spec, Duration::ZERO, error)
}
