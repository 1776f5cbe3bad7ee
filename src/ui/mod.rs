//! Presentation boundary.
//!
//! The engine never prints. It reports structured progress to a [`Reporter`]
//! that the caller injects: [`ConsoleReporter`] for the terminal,
//! [`NullReporter`] when nothing should be shown.

pub mod icons;
pub mod progress;

pub use progress::ConsoleReporter;

use crate::budget::TokenUsage;
use crate::errors::PhaseError;
use crate::orchestrator::RunSummary;
use crate::phases::{Phase, PhaseResult};

/// Receives progress events. Every method defaults to a no-op.
pub trait Reporter: Send + Sync {
    fn run_started(&self, _run_id: &str, _iterations: u32) {}

    fn iteration_started(&self, _iteration: u32, _total: u32) {}

    fn phase_started(&self, _phase: Phase) {}

    fn phase_skipped(&self, _phase: Phase, _reason: &str) {}

    fn phase_finished(&self, _result: &PhaseResult) {}

    fn phase_failed(&self, _phase: Phase, _error: &PhaseError) {}

    fn tool_use(&self, _name: &str, _description: &str) {}

    /// A short snippet of agent text.
    fn text(&self, _snippet: &str) {}

    /// The agent announced the record it is working on.
    fn working_on(&self, _record_id: &str) {}

    fn usage(&self, _phase: Phase, _usage: &TokenUsage, _ceiling: u64) {}

    fn idle(&self, _consecutive: u32, _limit: u32) {}

    fn run_finished(&self, _summary: &RunSummary) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {}
