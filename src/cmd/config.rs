//! Configuration view and validation commands: `triad config`.

use anyhow::{Context, Result};
use console::style;
use std::fmt::Write;
use std::path::Path;

use triad::config::TriadToml;
use triad::phases::Phase;

use super::initialized_paths;
use crate::ConfigCommands;

pub fn cmd_config(project_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    let paths = initialized_paths(project_dir)?;
    let config_path = paths.config();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("{}", style("Triad Configuration").bold());
            println!("===================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No triad.toml found at {}", config_path.display());
                println!("Run 'triad config init' to create one.");
            }
            println!();

            let config = TriadToml::load_or_default(&paths)?;
            print!("{}", render_effective(&config));
            if let Err(e) = config.validate() {
                println!();
                println!("{} {e}", style("warning:").yellow());
            }
            println!();
        }
        Some(ConfigCommands::Validate) => {
            if !config_path.exists() {
                println!("No triad.toml found. Using defaults (valid).");
                return Ok(());
            }
            let config = TriadToml::load(&config_path)?;
            config
                .validate()
                .with_context(|| format!("In {}", config_path.display()))?;
            println!("Configuration is valid.");
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("triad.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }
            TriadToml::default().save(&config_path)?;
            println!("Created triad.toml at {}", config_path.display());
        }
    }

    Ok(())
}

/// Effective values after file, environment and per-phase layering.
fn render_effective(config: &TriadToml) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Effective values (with env overrides):");
    let _ = writeln!(out, "  claude_cmd = \"{}\"", config.claude_cmd());
    let _ = writeln!(out, "  skip_permissions = {}", config.skip_permissions());
    let _ = writeln!(
        out,
        "  max_idle_iterations = {}",
        config.defaults.max_idle_iterations
    );
    if !config.defaults.context_files.is_empty() {
        let _ = writeln!(
            out,
            "  context_files = [{}]",
            quoted(&config.defaults.context_files)
        );
    }

    for phase in [Phase::Planner, Phase::Builder, Phase::Reviewer, Phase::Chat] {
        let settings = config.phase_settings(phase);
        let _ = writeln!(out, "\n[{}]", phase.name());
        let _ = writeln!(out, "  model = \"{}\"", settings.model);
        let _ = writeln!(out, "  max_tokens = {}", settings.max_tokens);
        let _ = writeln!(out, "  progress_lines = {}", settings.progress_lines);
        let _ = writeln!(
            out,
            "  allowed_tools = [{}]",
            quoted(&settings.allowed_tools)
        );
    }
    out
}

fn quoted(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("\"{i}\""))
        .collect::<Vec<_>>()
        .join(", ")
}
