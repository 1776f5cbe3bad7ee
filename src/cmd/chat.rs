use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use triad::orchestrator::ClaudeRunner;
use triad::orchestrator::runner::compose_prompt;
use triad::phases::Phase;
use triad::prompts::{self, BuiltinPrompts, PromptRenderer};
use triad::store::RecordStore;

use super::{initialized_paths, load_config};

pub async fn cmd_chat(project_dir: &Path, model: Option<&str>) -> Result<()> {
    let paths = initialized_paths(project_dir)?;
    let mut config = load_config(&paths)?;
    if let Some(model) = model {
        config.phases.chat.model = Some(model.to_string());
        config.validate().context("Invalid --model")?;
    }
    let settings = config.phase_settings(Phase::Chat);

    let store = RecordStore::load(&paths.store())
        .with_context(|| format!("Failed to load {}", paths.store().display()))?;
    let data = prompts::gather(Phase::Chat, &paths, &store, settings.progress_lines, 0)
        .context("Failed to assemble chat prompt")?;
    let prompt = compose_prompt(
        &BuiltinPrompts.render(&data),
        &config.context_files(&paths),
        paths.root(),
    );

    let runner = ClaudeRunner::from_config(&config);
    println!(
        "Starting chat with {} ({})",
        style(runner.claude_cmd()).bold(),
        settings.model
    );
    let code = runner
        .run_interactive(&prompt, &settings.model, &settings.allowed_tools, paths.root())
        .await?;

    match code {
        Some(0) => Ok(()),
        Some(code) => anyhow::bail!("Chat session exited with status {code}"),
        None => anyhow::bail!("Chat session was terminated by a signal"),
    }
}
