use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "triad")]
#[command(
    version,
    about = "Planner, builder and reviewer agents working through a requirement queue"
)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the .triad/ directory
    Init,
    /// Show requirement records grouped by status
    Status,
    /// Run planner → builder → reviewer iterations
    Run {
        /// Maximum number of iterations
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        iterations: u32,

        #[arg(long)]
        planner_model: Option<String>,

        #[arg(long)]
        builder_model: Option<String>,

        #[arg(long)]
        reviewer_model: Option<String>,

        /// Token ceiling for one planner invocation
        #[arg(long)]
        planner_max_tokens: Option<u64>,

        /// Token ceiling for one builder invocation
        #[arg(long)]
        builder_max_tokens: Option<u64>,

        /// Token ceiling for one reviewer invocation
        #[arg(long)]
        reviewer_max_tokens: Option<u64>,
    },
    /// Interactive session for adding and refining records
    Chat {
        #[arg(long)]
        model: Option<String>,
    },
    /// View and validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate triad.toml
    Validate,
    /// Write a default triad.toml if none exists
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    triad::logging::init(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Init => cmd::cmd_init(&project_dir)?,
        Commands::Status => cmd::cmd_status(&project_dir)?,
        Commands::Run {
            iterations,
            planner_model,
            builder_model,
            reviewer_model,
            planner_max_tokens,
            builder_max_tokens,
            reviewer_max_tokens,
        } => {
            let overrides = triad::config::CliOverrides {
                planner_model: planner_model.clone(),
                builder_model: builder_model.clone(),
                reviewer_model: reviewer_model.clone(),
                planner_max_tokens: *planner_max_tokens,
                builder_max_tokens: *builder_max_tokens,
                reviewer_max_tokens: *reviewer_max_tokens,
            };
            cmd::cmd_run(&cli, &project_dir, *iterations, &overrides).await?;
        }
        Commands::Chat { model } => cmd::cmd_chat(&project_dir, model.as_deref()).await?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
