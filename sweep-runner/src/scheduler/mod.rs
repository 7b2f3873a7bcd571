//! Scheduler layer
//!
//! Turns a batch request into jobs, fans them out to a bounded worker
//! pool and gathers their results into a run summary.

mod batch;

pub use batch::{BatchRequest, BatchScheduler, NoProgress, ProgressSink};
