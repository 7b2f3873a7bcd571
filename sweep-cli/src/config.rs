//! CLI configuration
//!
//! Starts from the `SWEEP_*` environment and applies command-line flags on
//! top, so a flag always wins over the variable it shadows.

use anyhow::{Context, Result};
use std::time::Duration;
use sweep_core::BatchId;
use sweep_runner::Config;

use crate::Cli;

pub fn load(cli: &Cli) -> Result<Config> {
    let config = Config::from_env().context("Invalid SWEEP_* environment variable")?;
    let config = apply(config, cli)?;

    config.validate().context("Invalid configuration")?;

    Ok(config)
}

fn apply(mut config: Config, cli: &Cli) -> Result<Config> {
    if let Some(dir) = &cli.output_dir {
        config.output_root = dir.clone();
    }

    if let Some(batch) = &cli.batch_id {
        let batch = BatchId::new(batch.as_str()).context("Invalid --batch-id")?;
        config = config.with_batch(batch);
    }

    if let Some(concurrency) = cli.concurrency {
        config = config.with_concurrency(concurrency);
    }

    if let Some(secs) = cli.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }

    if let Some(dir) = &cli.prompts_dir {
        config.prompts_dir = dir.clone();
    }

    if let Some(dir) = &cli.tasks_dir {
        config.tasks_dir = dir.clone();
    }

    if let Some(url) = &cli.api_url {
        config.api_url = url.clone();
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("run").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_override_config() {
        let cli = parse(&[
            "haiku",
            "task_A",
            "v4",
            "--output-dir",
            "results",
            "--batch-id",
            "round21",
            "--concurrency",
            "2",
            "--timeout",
            "60",
        ]);

        let config = apply(Config::default(), &cli).unwrap();

        assert_eq!(config.output_dir(), PathBuf::from("results/round21"));
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_batch_id() {
        let cli = parse(&["haiku", "task_A", "v4", "--batch-id", "../up"]);

        assert!(apply(Config::default(), &cli).is_err());
    }

    #[test]
    fn test_zero_concurrency_fails_validation() {
        let cli = parse(&["haiku", "task_A", "v4", "--concurrency", "0"]);

        let config = apply(Config::default(), &cli).unwrap();
        assert!(config.validate().is_err());
    }
}
