//! Final run report

use colored::*;
use std::fmt::Write;
use sweep_core::{JobResult, RunSummary};

/// Most re-run commands listed under `Examples:`
const MAX_EXAMPLES: usize = 5;

const RULE: &str = "========================================";

pub fn print(summary: &RunSummary) {
    print!("{}", render(summary));
}

pub fn render(summary: &RunSummary) -> String {
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(
        out,
        " Completed {} experiments",
        summary.succeeded() + summary.skipped()
    );
    let _ = writeln!(out, " Results in: {}", summary.output_dir().display());
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out);

    let failed = format!("Failed: {}", summary.failed());
    let _ = writeln!(
        out,
        " {}  {}  {}",
        format!("Succeeded: {}", summary.succeeded()).green(),
        format!("Skipped: {}", summary.skipped()).yellow(),
        if summary.failed() > 0 { failed.red() } else { failed.normal() }
    );

    let usage = summary.usage();
    if usage.total() > 0 {
        let _ = writeln!(
            out,
            " Tokens: {} in, {} out, {} total",
            usage.input_tokens,
            usage.output_tokens,
            usage.total()
        );
    }

    if summary.failed() > 0 {
        let _ = writeln!(out);
        let _ = writeln!(out, " {}", "Failed jobs:".bold());
        for result in summary.failures() {
            if let Some(error) = result.error() {
                let _ = writeln!(out, "   {} -> {}", result.spec(), error.to_string().red());
            }
        }
    }

    let examples = examples(summary);
    if !examples.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, " Examples:");
        for result in examples {
            let _ = writeln!(out, "   run {}", result.spec());
        }
    }

    out
}

/// Jobs worth re-running: failures first, otherwise the first requested
fn examples(summary: &RunSummary) -> Vec<&JobResult> {
    let failed: Vec<_> = summary.failures().take(MAX_EXAMPLES).collect();
    if !failed.is_empty() {
        return failed;
    }

    summary.results().iter().take(MAX_EXAMPLES).collect()
}
