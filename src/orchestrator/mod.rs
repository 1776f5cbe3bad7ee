//! Agent invocation and the planner → builder → reviewer loop.

pub mod driver;
pub mod engine;
pub mod lock;
pub mod runner;
pub mod state;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::budget::TokenUsage;
use crate::errors::InvocationError;
use crate::phases::Phase;
use crate::signals::SignalSet;
use crate::ui::Reporter;

pub use driver::StreamDriver;
pub use engine::{
    Engine, IterationRecord, PhaseFailure, RunSummary, StopReason, journal_path, latest_run_id,
};
pub use lock::RunLock;
pub use runner::ClaudeRunner;
pub use state::{IdleTracker, IterationSnapshot, JournalEntry, RunJournal};

/// Everything needed to launch one non-interactive agent turn.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub phase: Phase,
    pub iteration: u32,
    pub prompt: String,
    pub model: String,
    pub max_tokens: u64,
    pub allowed_tools: Vec<String>,
    pub context_files: Vec<PathBuf>,
    pub workdir: PathBuf,
    /// Where to write the prompt and captured output, if anywhere.
    pub log_dir: Option<PathBuf>,
}

/// What came back from one agent turn.
#[derive(Debug, Clone, Default)]
pub struct InvocationOutcome {
    /// Captured text: the final result text when present, otherwise every
    /// text segment seen.
    pub output: String,
    pub signals: SignalSet,
    pub usage: TokenUsage,
    /// Stopped by the token ceiling or a terminal signal rather than EOF.
    pub terminated_early: bool,
    pub exit_code: Option<i32>,
}

/// Runs one agent turn. Implemented by [`ClaudeRunner`] for the real CLI
/// and by scripted stand-ins in tests.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(
        &self,
        invocation: &Invocation,
        reporter: &dyn Reporter,
    ) -> Result<InvocationOutcome, InvocationError>;
}
