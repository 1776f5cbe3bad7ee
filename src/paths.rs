//! Locations inside the `.triad/` project directory, plus small readers for
//! the context files that feed prompts.

use std::path::{Path, PathBuf};

use crate::phases::Phase;

pub const TRIAD_DIR: &str = ".triad";
pub const STORE_FILE: &str = "prd.json";
pub const PROGRESS_FILE: &str = "progress.md";
pub const PROMPT_FILE: &str = "prompt.md";
pub const CONFIG_FILE: &str = "triad.toml";
pub const PLANS_DIR: &str = "plans";
pub const PROMPTS_DIR: &str = "prompts";
pub const LOGS_DIR: &str = "logs";
pub const LOCK_FILE: &str = "run.lock";

/// Resolved paths for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    root: PathBuf,
    dir: PathBuf,
}

impl ProjectPaths {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        let root = project_dir.into();
        let dir = root.join(TRIAD_DIR);
        Self { root, dir }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn exists(&self) -> bool {
        self.dir.is_dir()
    }

    pub fn store(&self) -> PathBuf {
        self.dir.join(STORE_FILE)
    }

    pub fn progress(&self) -> PathBuf {
        self.dir.join(PROGRESS_FILE)
    }

    pub fn prompt(&self) -> PathBuf {
        self.dir.join(PROMPT_FILE)
    }

    pub fn config(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn plans_dir(&self) -> PathBuf {
        self.dir.join(PLANS_DIR)
    }

    pub fn prompts_dir(&self) -> PathBuf {
        self.dir.join(PROMPTS_DIR)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.dir.join(LOGS_DIR)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    /// Guidance file for a phase (`prompts/<phase>.md`).
    pub fn augmentation(&self, phase: Phase) -> PathBuf {
        self.prompts_dir().join(format!("{}.md", phase.name()))
    }

    /// Absolute location of a record's plan document.
    pub fn plan_path(&self, record_id: &str) -> PathBuf {
        self.plans_dir()
            .join(format!("{}-plan.md", sanitize_id(record_id)))
    }

    /// Project-relative plan path, as stored in the record's `activePlan`.
    pub fn plan_reference(&self, record_id: &str) -> String {
        format!(
            "{TRIAD_DIR}/{PLANS_DIR}/{}-plan.md",
            sanitize_id(record_id)
        )
    }

    /// Turn a stored plan reference back into a path.
    pub fn resolve(&self, reference: &str) -> PathBuf {
        let path = Path::new(reference);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Files attached to every invocation.
    pub fn standard_context_files(&self) -> Vec<PathBuf> {
        vec![self.store(), self.progress(), self.prompt()]
    }
}

/// Keep ids safe for use as a file name component.
fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// File contents, or an empty string when unreadable.
pub fn read_or_empty(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

/// The last `n` lines of a file; empty when the file is missing.
pub fn read_last_lines(path: &Path, n: usize) -> String {
    let content = read_or_empty(path);
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() <= n {
        return content;
    }
    lines[lines.len() - n..].join("\n")
}

/// Trimmed guidance text; a missing or blank file counts as absent.
pub fn read_augmentation(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let trimmed = content.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
