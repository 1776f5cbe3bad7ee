use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use triad::config::CliOverrides;
use triad::orchestrator::{ClaudeRunner, Engine, StopReason};
use triad::ui::ConsoleReporter;

use super::{initialized_paths, load_config};
use crate::Cli;

pub async fn cmd_run(
    cli: &Cli,
    project_dir: &Path,
    iterations: u32,
    overrides: &CliOverrides,
) -> Result<()> {
    let paths = initialized_paths(project_dir)?;
    let mut config = load_config(&paths)?;
    config.apply_overrides(overrides);
    config.validate().context("Invalid command-line overrides")?;

    let invoker = Arc::new(ClaudeRunner::from_config(&config));
    tracing::info!(
        claude_cmd = invoker.claude_cmd(),
        iterations,
        "Starting run"
    );

    let engine = Engine::new(paths, config, invoker)
        .with_reporter(Arc::new(ConsoleReporter::new(cli.verbose)));
    let summary = engine
        .run_loop(iterations)
        .await
        .context("Run aborted")?;

    let failures = summary.errors().len();
    tracing::info!(
        run_id = %summary.run_id,
        iterations = summary.iterations.len(),
        failures,
        "Run finished"
    );

    if let StopReason::Idle { consecutive } = summary.stop {
        tracing::warn!(consecutive, "Run stopped on idle iterations");
    }
    Ok(())
}
