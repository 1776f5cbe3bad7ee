//! Phase controllers: planner, builder and reviewer.
//!
//! Each controller exposes a pure run predicate, assembles the data for its
//! prompt, and applies the signals returned by the agent to the store.

pub mod builder;
pub mod planner;
pub mod reviewer;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::budget::TokenUsage;
use crate::signals::{Signal, SignalSet};

/// The roles that invoke the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Planner,
    Builder,
    Reviewer,
    /// Interactive session; never part of the loop.
    Chat,
}

impl Phase {
    /// The phases of one loop iteration, in execution order.
    pub const LOOP: [Phase; 3] = [Phase::Planner, Phase::Builder, Phase::Reviewer];

    pub fn name(self) -> &'static str {
        match self {
            Phase::Planner => "planner",
            Phase::Builder => "builder",
            Phase::Reviewer => "reviewer",
            Phase::Chat => "chat",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "planner" => Some(Phase::Planner),
            "builder" => Some(Phase::Builder),
            "reviewer" => Some(Phase::Reviewer),
            "chat" => Some(Phase::Chat),
            _ => None,
        }
    }

    /// Short description shown when the phase starts.
    pub fn purpose(self) -> &'static str {
        match self {
            Phase::Planner => "selecting a record and writing its plan",
            Phase::Builder => "implementing the active plan",
            Phase::Reviewer => "verifying pending work and updating plans",
            Phase::Chat => "interactive session",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A signal that could not be applied, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoredSignal {
    pub signal: Signal,
    pub reason: String,
}

impl IgnoredSignal {
    pub fn new(signal: &Signal, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        tracing::warn!(signal = %signal, reason = %reason, "ignoring signal");
        Self {
            signal: signal.clone(),
            reason,
        }
    }
}

/// Planner outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerSummary {
    pub planned: Option<String>,
    pub plan_path: Option<String>,
    pub skip_reason: Option<String>,
    pub blocked: Option<String>,
    pub bailout: Option<String>,
}

/// Builder outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderSummary {
    pub record_id: String,
    pub completed: bool,
    pub bailout: Option<String>,
    pub blocked: Option<String>,
}

/// Reviewer outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerSummary {
    pub verified: Vec<String>,
    /// `(record id, reason)`
    pub rejected: Vec<(String, String)>,
    pub plan_updated: Vec<String>,
    pub loop_risk: Vec<String>,
    pub prompt_updated: Vec<String>,
    pub analysis_complete: bool,
    pub blocked: Option<String>,
    pub bailout: Option<String>,
}

/// Phase-specific result summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhaseSummary {
    Skipped { reason: String },
    Planner(PlannerSummary),
    Builder(BuilderSummary),
    Reviewer(ReviewerSummary),
}

/// Everything one phase turn produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase: Phase,
    pub summary: PhaseSummary,
    pub signals: SignalSet,
    pub usage: TokenUsage,
    pub ignored: Vec<IgnoredSignal>,
}

impl PhaseResult {
    pub fn skipped(phase: Phase, reason: impl Into<String>) -> Self {
        Self {
            phase,
            summary: PhaseSummary::Skipped {
                reason: reason.into(),
            },
            signals: SignalSet::new(),
            usage: TokenUsage::default(),
            ignored: Vec::new(),
        }
    }

    pub fn was_skipped(&self) -> bool {
        matches!(self.summary, PhaseSummary::Skipped { .. })
    }

    /// The bailout reason, if this phase stopped early.
    pub fn bailout(&self) -> Option<&str> {
        match &self.summary {
            PhaseSummary::Planner(s) => s.bailout.as_deref(),
            PhaseSummary::Builder(s) => s.bailout.as_deref(),
            PhaseSummary::Reviewer(s) => s.bailout.as_deref(),
            PhaseSummary::Skipped { .. } => None,
        }
    }
}

/// First detail of a kind, if any.
pub(crate) fn first_detail(signals: &SignalSet, kind: crate::signals::SignalKind) -> Option<String> {
    signals.first(kind).and_then(|s| s.detail.clone())
}
