//! Typed error hierarchy for the triad engine.
//!
//! - `StoreError`: loading, saving and mutating the requirement record store
//! - `InvocationError`: launching and streaming the agent subprocess
//! - `PhaseError`: one planner/builder/reviewer turn
//! - `RunError`: a whole multi-iteration run
//! - `ConfigError`: configuration validation

use std::path::PathBuf;

use thiserror::Error;

use crate::phases::Phase;
use crate::store::Status;

/// Errors from the requirement record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read record store at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse record store at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write record store at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize record store: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Record store at {path} contains duplicate record id '{id}'")]
    DuplicateId { path: PathBuf, id: String },

    #[error("Record '{id}' not found")]
    NotFound { id: String },

    #[error("Record '{id}' cannot move from {from} to {to}")]
    InvalidTransition { id: String, from: Status, to: Status },
}

/// Errors from a single agent subprocess invocation.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("Failed to spawn '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write prompt to agent stdin: {0}")]
    StdinWrite(#[source] std::io::Error),

    #[error("Failed to read agent output stream: {0}")]
    StreamRead(#[source] std::io::Error),

    #[error("Agent process did not expose a stdout pipe")]
    MissingStdout,

    #[error("Failed to write invocation log at {path}: {source}")]
    LogWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for agent process: {0}")]
    Wait(#[source] std::io::Error),
}

/// Errors from one phase turn.
///
/// `Store` errors are fatal to a whole run; everything else is isolated to
/// the phase that produced it.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{phase} invocation failed: {source}")]
    Invocation {
        phase: Phase,
        #[source]
        source: InvocationError,
    },

    #[error("{phase} prompt rendered empty")]
    EmptyPrompt { phase: Phase },
}

/// Errors that end a whole run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to open run lock at {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Another run already holds the lock at {path}")]
    AlreadyRunning { path: PathBuf },

    #[error("Failed to create log directory {path}: {source}")]
    LogDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Configuration validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {scope} model '{model}': must be 'haiku', 'sonnet', or 'opus'")]
    InvalidModel { scope: String, model: String },

    #[error("Invalid {scope} max_tokens {value}: must be between {min} and {max}")]
    TokensOutOfRange {
        scope: String,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("Invalid {scope} progress_lines {value}: must be between {min} and {max}")]
    ProgressLinesOutOfRange {
        scope: String,
        value: usize,
        min: usize,
        max: usize,
    },

    #[error("Invalid max_idle_iterations {0}: must be at least 1")]
    IdleLimit(u32),
}
