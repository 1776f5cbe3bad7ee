//! Initialization for triad projects.
//!
//! `triad init` creates the `.triad/` directory:
//!
//! ```text
//! .triad/
//! ├── prd.json         # Requirement records ({"prds": []})
//! ├── progress.md      # Append-only progress log
//! ├── prompt.md        # Codebase context for the agents
//! ├── triad.toml       # Configuration
//! ├── plans/           # <record-id>-plan.md
//! ├── prompts/         # planner.md, builder.md, reviewer.md, chat.md
//! └── logs/            # One directory per run
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::paths::ProjectPaths;
use crate::phases::Phase;

const EMPTY_STORE: &str = "{\n  \"prds\": []\n}\n";

const PROMPT_TEMPLATE: &str = r#"# Codebase Context

This file gives the planner and builder context about the codebase.
Run `triad chat` to have the agent help map it.

## Project Overview
<!-- What this project does -->

## Directory Structure
<!-- Key directories and their purposes -->

## Technology Stack
<!-- Languages, frameworks, tools -->

## Build & Test Commands
<!-- How to build, test, lint -->

## Code Patterns
<!-- Conventions agents should follow -->
"#;

const CONFIG_TEMPLATE: &str = r#"# triad configuration. Every key is optional.

[defaults]
# model = "sonnet"            # haiku | sonnet | opus
# max_tokens = 100000         # 10000..=200000
# skip_permissions = true
# max_idle_iterations = 3
# context_files = []

# [phases.reviewer]
# model = "opus"
# max_tokens = 80000
# progress_lines = 200
"#;

/// Result of initializing a triad project.
#[derive(Debug)]
pub struct InitResult {
    /// Path to the .triad directory
    pub triad_dir: PathBuf,
    /// Whether the directory was newly created (false if it already existed)
    pub created: bool,
}

/// Initialize a triad project in the given directory.
///
/// An existing `.triad/` is completed rather than overwritten; files that
/// already exist are left alone.
pub fn init_project(project_dir: &Path) -> Result<InitResult> {
    let paths = ProjectPaths::new(project_dir);
    let created = !paths.exists();

    for dir in [
        paths.dir().to_path_buf(),
        paths.plans_dir(),
        paths.prompts_dir(),
        paths.logs_dir(),
    ] {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    let progress = format!(
        "# Progress Log\n\nInitialized: {}\n\n## Codebase Patterns\n<!-- Patterns discovered along the way -->\n\n---\n\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    write_if_missing(&paths.store(), EMPTY_STORE)?;
    write_if_missing(&paths.progress(), &progress)?;
    write_if_missing(&paths.prompt(), PROMPT_TEMPLATE)?;
    write_if_missing(&paths.config(), CONFIG_TEMPLATE)?;
    for phase in [Phase::Planner, Phase::Builder, Phase::Reviewer, Phase::Chat] {
        write_if_missing(&paths.augmentation(phase), "")?;
    }

    Ok(InitResult {
        triad_dir: paths.dir().to_path_buf(),
        created,
    })
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to create {}", path.display()))
}

/// Check if a project is already initialized.
pub fn is_initialized(project_dir: &Path) -> bool {
    ProjectPaths::new(project_dir).exists()
}
