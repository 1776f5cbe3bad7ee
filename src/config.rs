//! Configuration for triad, read from `.triad/triad.toml`.
//!
//! Settings are layered: built-in defaults, then the file, then environment
//! variables (`CLAUDE_CMD`, `SKIP_PERMISSIONS`), then CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [project]
//! claude_cmd = "claude"
//!
//! [defaults]
//! model = "sonnet"
//! max_tokens = 100000
//! skip_permissions = true
//! max_idle_iterations = 3
//! context_files = ["docs/architecture.md"]
//!
//! [phases.reviewer]
//! model = "opus"
//! max_tokens = 120000
//! progress_lines = 300
//! allowed_tools = ["Read", "Grep", "Glob", "Bash", "Edit", "Write"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::ConfigError;
use crate::paths::ProjectPaths;
use crate::phases::Phase;

pub const VALID_MODELS: [&str; 3] = ["haiku", "sonnet", "opus"];
pub const MIN_TOKENS: u64 = 10_000;
pub const MAX_TOKENS: u64 = 200_000;
pub const MIN_PROGRESS_LINES: usize = 10;
pub const MAX_PROGRESS_LINES: usize = 1000;

const DEFAULT_MODEL: &str = "sonnet";

/// Tools the agent may use unless a phase narrows the list.
pub const DEFAULT_ALLOWED_TOOLS: [&str; 10] = [
    "Read",
    "Write",
    "Edit",
    "Bash",
    "Glob",
    "Grep",
    "Task",
    "TodoWrite",
    "WebSearch",
    "WebFetch",
];

/// Built-in `(max_tokens, progress_lines)` per phase.
fn builtin_limits(phase: Phase) -> (u64, usize) {
    match phase {
        Phase::Planner => (80_000, 20),
        Phase::Builder => (100_000, 20),
        Phase::Reviewer => (80_000, 200),
        Phase::Chat => (100_000, 20),
    }
}

/// Project-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSection {
    /// Agent CLI command (default: "claude")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claude_cmd: Option<String>,
}

/// Defaults shared by all phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    /// Whether to pass `--dangerously-skip-permissions` to the agent
    #[serde(default = "default_skip_permissions")]
    pub skip_permissions: bool,
    /// Consecutive idle iterations before a run stops
    #[serde(default = "default_max_idle_iterations")]
    pub max_idle_iterations: u32,
    /// Extra files attached to every invocation, relative to the project root
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_files: Vec<String>,
}

fn default_skip_permissions() -> bool {
    true
}

fn default_max_idle_iterations() -> u32 {
    3
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: None,
            skip_permissions: default_skip_permissions(),
            max_idle_iterations: default_max_idle_iterations(),
            context_files: Vec::new(),
        }
    }
}

/// Per-phase overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_lines: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhasesSection {
    #[serde(default)]
    pub planner: PhaseOverride,
    #[serde(default)]
    pub builder: PhaseOverride,
    #[serde(default)]
    pub reviewer: PhaseOverride,
    #[serde(default)]
    pub chat: PhaseOverride,
}

impl PhasesSection {
    fn get(&self, phase: Phase) -> &PhaseOverride {
        match phase {
            Phase::Planner => &self.planner,
            Phase::Builder => &self.builder,
            Phase::Reviewer => &self.reviewer,
            Phase::Chat => &self.chat,
        }
    }

    fn get_mut(&mut self, phase: Phase) -> &mut PhaseOverride {
        match phase {
            Phase::Planner => &mut self.planner,
            Phase::Builder => &mut self.builder,
            Phase::Reviewer => &mut self.reviewer,
            Phase::Chat => &mut self.chat,
        }
    }
}

/// Effective settings for one phase after layering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSettings {
    pub model: String,
    pub max_tokens: u64,
    pub progress_lines: usize,
    pub allowed_tools: Vec<String>,
}

/// Per-phase CLI overrides for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub planner_model: Option<String>,
    pub builder_model: Option<String>,
    pub reviewer_model: Option<String>,
    pub planner_max_tokens: Option<u64>,
    pub builder_max_tokens: Option<u64>,
    pub reviewer_max_tokens: Option<u64>,
}

/// The parsed `triad.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriadToml {
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub defaults: DefaultsSection,
    #[serde(default)]
    pub phases: PhasesSection,
}

impl TriadToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("In {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse triad.toml")
    }

    /// Load from `paths.config()`, or defaults when the file does not exist.
    pub fn load_or_default(paths: &ProjectPaths) -> Result<Self> {
        let config_path = paths.config();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize triad.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Agent command (file → env → default).
    pub fn claude_cmd(&self) -> String {
        self.project
            .claude_cmd
            .clone()
            .or_else(|| std::env::var("CLAUDE_CMD").ok())
            .unwrap_or_else(|| "claude".to_string())
    }

    /// skip_permissions; the environment variable wins over the file.
    pub fn skip_permissions(&self) -> bool {
        if let Ok(env_val) = std::env::var("SKIP_PERMISSIONS") {
            return env_val != "false";
        }
        self.defaults.skip_permissions
    }

    /// Effective settings for `phase`: phase value, then `[defaults]`, then built-in.
    pub fn phase_settings(&self, phase: Phase) -> PhaseSettings {
        let (builtin_tokens, builtin_lines) = builtin_limits(phase);
        let over = self.phases.get(phase);
        PhaseSettings {
            model: over
                .model
                .clone()
                .or_else(|| self.defaults.model.clone())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: over
                .max_tokens
                .or(self.defaults.max_tokens)
                .unwrap_or(builtin_tokens),
            progress_lines: over.progress_lines.unwrap_or(builtin_lines),
            allowed_tools: over.allowed_tools.clone().unwrap_or_else(|| {
                DEFAULT_ALLOWED_TOOLS.iter().map(|t| t.to_string()).collect()
            }),
        }
    }

    /// Apply CLI flags on top of the file values.
    pub fn apply_overrides(&mut self, overrides: &CliOverrides) {
        let models = [
            (Phase::Planner, &overrides.planner_model),
            (Phase::Builder, &overrides.builder_model),
            (Phase::Reviewer, &overrides.reviewer_model),
        ];
        for (phase, model) in models {
            if let Some(model) = model {
                self.phases.get_mut(phase).model = Some(model.clone());
            }
        }
        let tokens = [
            (Phase::Planner, overrides.planner_max_tokens),
            (Phase::Builder, overrides.builder_max_tokens),
            (Phase::Reviewer, overrides.reviewer_max_tokens),
        ];
        for (phase, max_tokens) in tokens {
            if max_tokens.is_some() {
                self.phases.get_mut(phase).max_tokens = max_tokens;
            }
        }
    }

    /// Files attached to every invocation: the standard context files, then
    /// the configured extras, de-duplicated in order.
    pub fn context_files(&self, paths: &ProjectPaths) -> Vec<PathBuf> {
        let mut files = paths.standard_context_files();
        for extra in &self.defaults.context_files {
            let path = paths.resolve(extra);
            if !files.contains(&path) {
                files.push(path);
            }
        }
        files
    }

    /// Reject unknown models and out-of-range limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_model("defaults", self.defaults.model.as_deref())?;
        check_tokens("defaults", self.defaults.max_tokens)?;
        if self.defaults.max_idle_iterations == 0 {
            return Err(ConfigError::IdleLimit(0));
        }

        for phase in [Phase::Planner, Phase::Builder, Phase::Reviewer, Phase::Chat] {
            let over = self.phases.get(phase);
            let scope = phase.name();
            check_model(scope, over.model.as_deref())?;
            check_tokens(scope, over.max_tokens)?;
            if let Some(lines) = over.progress_lines
                && !(MIN_PROGRESS_LINES..=MAX_PROGRESS_LINES).contains(&lines)
            {
                return Err(ConfigError::ProgressLinesOutOfRange {
                    scope: scope.to_string(),
                    value: lines,
                    min: MIN_PROGRESS_LINES,
                    max: MAX_PROGRESS_LINES,
                });
            }
        }
        Ok(())
    }
}

fn check_model(scope: &str, model: Option<&str>) -> Result<(), ConfigError> {
    match model {
        Some(m) if !VALID_MODELS.contains(&m) => Err(ConfigError::InvalidModel {
            scope: scope.to_string(),
            model: m.to_string(),
        }),
        _ => Ok(()),
    }
}

fn check_tokens(scope: &str, tokens: Option<u64>) -> Result<(), ConfigError> {
    match tokens {
        Some(t) if !(MIN_TOKENS..=MAX_TOKENS).contains(&t) => Err(ConfigError::TokensOutOfRange {
            scope: scope.to_string(),
            value: t,
            min: MIN_TOKENS,
            max: MAX_TOKENS,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_builtin_phase_defaults() {
        let config = TriadToml::default();
        let planner = config.phase_settings(Phase::Planner);
        assert_eq!(planner.model, "sonnet");
        assert_eq!(planner.max_tokens, 80_000);
        assert_eq!(planner.progress_lines, 20);
        assert_eq!(planner.allowed_tools.len(), 10);

        assert_eq!(config.phase_settings(Phase::Builder).max_tokens, 100_000);
        let reviewer = config.phase_settings(Phase::Reviewer);
        assert_eq!(reviewer.max_tokens, 80_000);
        assert_eq!(reviewer.progress_lines, 200);
        assert_eq!(config.defaults.max_idle_iterations, 3);
        assert!(config.defaults.skip_permissions);
    }

    #[test]
    fn test_parse_layers_phase_over_defaults() {
        let config = TriadToml::parse(
            r#"
[defaults]
model = "haiku"
max_tokens = 50000

[phases.reviewer]
model = "opus"
progress_lines = 300
allowed_tools = ["Read", "Grep"]
"#,
        )
        .unwrap();

        let builder = config.phase_settings(Phase::Builder);
        assert_eq!(builder.model, "haiku");
        assert_eq!(builder.max_tokens, 50_000);

        let reviewer = config.phase_settings(Phase::Reviewer);
        assert_eq!(reviewer.model, "opus");
        assert_eq!(reviewer.max_tokens, 50_000);
        assert_eq!(reviewer.progress_lines, 300);
        assert_eq!(reviewer.allowed_tools, vec!["Read", "Grep"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(TriadToml::parse("").unwrap(), TriadToml::default());
    }

    #[test]
    fn test_unparseable_file_is_error() {
        assert!(TriadToml::parse("[defaults\nmodel = ").is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_model() {
        let config = TriadToml::parse("[phases.builder]\nmodel = \"gpt-4\"").unwrap();
        match config.validate() {
            Err(ConfigError::InvalidModel { scope, model }) => {
                assert_eq!(scope, "builder");
                assert_eq!(model, "gpt-4");
            }
            other => panic!("expected InvalidModel, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_token_and_line_ranges() {
        let config = TriadToml::parse("[defaults]\nmax_tokens = 5000").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TokensOutOfRange { value: 5000, .. })
        ));

        let config = TriadToml::parse("[phases.planner]\nprogress_lines = 5").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ProgressLinesOutOfRange { value: 5, .. })
        ));

        let config = TriadToml::parse("[defaults]\nmax_idle_iterations = 0").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::IdleLimit(0))));
    }

    #[test]
    fn test_cli_overrides_win() {
        let mut config = TriadToml::parse("[phases.builder]\nmodel = \"haiku\"").unwrap();
        config.apply_overrides(&CliOverrides {
            builder_model: Some("opus".into()),
            reviewer_max_tokens: Some(150_000),
            ..Default::default()
        });
        assert_eq!(config.phase_settings(Phase::Builder).model, "opus");
        assert_eq!(config.phase_settings(Phase::Reviewer).max_tokens, 150_000);
        assert_eq!(config.phase_settings(Phase::Planner).max_tokens, 80_000);
    }

    #[test]
    fn test_cli_overrides_are_validated() {
        let mut config = TriadToml::default();
        config.apply_overrides(&CliOverrides {
            planner_max_tokens: Some(999_999),
            ..Default::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_context_files_are_deduplicated() {
        let paths = ProjectPaths::new("/repo");
        let config = TriadToml::parse(
            "[defaults]\ncontext_files = [\".triad/prd.json\", \"docs/arch.md\", \"docs/arch.md\"]",
        )
        .unwrap();
        let files = config.context_files(&paths);
        assert_eq!(
            files,
            vec![
                PathBuf::from("/repo/.triad/prd.json"),
                PathBuf::from("/repo/.triad/progress.md"),
                PathBuf::from("/repo/.triad/prompt.md"),
                PathBuf::from("/repo/docs/arch.md"),
            ]
        );
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("triad.toml");
        let mut config = TriadToml::default();
        config.phases.planner.model = Some("opus".into());
        config.save(&path).unwrap();

        let loaded = TriadToml::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempdir().unwrap();
        let paths = ProjectPaths::new(dir.path());
        assert_eq!(
            TriadToml::load_or_default(&paths).unwrap(),
            TriadToml::default()
        );
    }
}
