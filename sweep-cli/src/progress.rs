//! Console progress
//!
//! One line per finished job, e.g.
//! `[3/8] sonnet task_H L8_generative_v2 -> Done (87s) -> 406 lines -> output/...`

use colored::*;
use sweep_core::{JobResult, Outcome};
use sweep_runner::ProgressSink;

/// Prints a progress line to stdout as each job finishes
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn job_finished(&self, position: usize, total: usize, result: &JobResult) {
        println!("{}", render(position, total, result));
    }
}

pub fn render(position: usize, total: usize, result: &JobResult) -> String {
    let spec = result.spec();
    let counter = format!("[{}/{}]", position, total).dimmed();

    let outcome = match result.outcome() {
        Outcome::Success { path, output_lines } => format!(
            "{} -> {} lines -> {}",
            format!("Done ({}s)", result.duration().as_secs_f64().round() as u64).green(),
            output_lines,
            path.display()
        ),
        Outcome::Skipped => "Skipped (exists)".yellow().to_string(),
        Outcome::Failed(error) => format!("FAILED {}", error).red().to_string(),
    };

    format!(
        "{} {} {} {} -> {}",
        counter,
        spec.model().cyan(),
        spec.task(),
        spec.technique(),
        outcome
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use sweep_core::{ErrorKind, JobError, JobSpec};

    fn spec() -> JobSpec {
        JobSpec::new("sonnet", "task_H", "L8_generative_v2").unwrap()
    }

    #[test]
    fn test_render_lines() {
        colored::control::set_override(false);

        let done = JobResult::succeeded(
            spec(),
            Duration::from_millis(86_600),
            PathBuf::from("output/sonnet+L8_generative_v2+task_H.md"),
            406,
            None,
        );
        assert_eq!(
            render(1, 3, &done),
            "[1/3] sonnet task_H L8_generative_v2 -> Done (87s) -> 406 lines -> output/sonnet+L8_generative_v2+task_H.md"
        );

        let skipped = JobResult::skipped(spec(), Duration::ZERO);
        assert_eq!(
            render(2, 3, &skipped),
            "[2/3] sonnet task_H L8_generative_v2 -> Skipped (exists)"
        );

        let failed = JobResult::failed(
            spec(),
            Duration::from_secs(300),
            JobError::new(ErrorKind::Timeout, "no response within 300s", 1),
        );
        assert_eq!(
            render(3, 3, &failed),
            "[3/3] sonnet task_H L8_generative_v2 -> FAILED Timeout: no response within 300s"
        );
    }
}
