//! Signal types for phase control.
//!
//! Signals are `###KIND###` / `###KIND:arg###` / `###KIND:arg1:arg2###`
//! markers that the agent embeds in its free-text output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed vocabulary of control markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    /// Builder: active record's acceptance criteria met.
    PrdComplete,
    /// Any phase stopped early; `detail` carries the reason.
    Bailout,
    /// Phase cannot proceed without intervention.
    Blocked,
    /// Reviewer finished its pass.
    AnalysisComplete,
    /// Reviewer confirms a pending record.
    Verified,
    /// Reviewer reverts a pending record; `detail` carries the reason.
    Rejected,
    /// Reviewer flags a record stuck across iterations.
    LoopRisk,
    /// Planner planned a record.
    PlanComplete,
    /// Planner found nothing eligible.
    PlanSkipped,
    /// Reviewer rewrote a plan after a bailout.
    PlanUpdated,
    /// Reviewer rewrote a phase's guidance file; `detail` is the phase name.
    PromptUpdated,
}

impl SignalKind {
    pub const ALL: [SignalKind; 11] = [
        SignalKind::PrdComplete,
        SignalKind::Bailout,
        SignalKind::Blocked,
        SignalKind::AnalysisComplete,
        SignalKind::Verified,
        SignalKind::Rejected,
        SignalKind::LoopRisk,
        SignalKind::PlanComplete,
        SignalKind::PlanSkipped,
        SignalKind::PlanUpdated,
        SignalKind::PromptUpdated,
    ];

    /// The marker tag as it appears between the `###` delimiters.
    pub fn tag(self) -> &'static str {
        match self {
            SignalKind::PrdComplete => "PRD_COMPLETE",
            SignalKind::Bailout => "BAILOUT",
            SignalKind::Blocked => "BLOCKED",
            SignalKind::AnalysisComplete => "ANALYSIS_COMPLETE",
            SignalKind::Verified => "VERIFIED",
            SignalKind::Rejected => "REJECTED",
            SignalKind::LoopRisk => "LOOP_RISK",
            SignalKind::PlanComplete => "PLAN_COMPLETE",
            SignalKind::PlanSkipped => "PLAN_SKIPPED",
            SignalKind::PlanUpdated => "PLAN_UPDATED",
            SignalKind::PromptUpdated => "PROMPT_UPDATED",
        }
    }

    /// Number of `:`-separated arguments the marker carries.
    pub fn arity(self) -> usize {
        match self {
            SignalKind::PrdComplete | SignalKind::AnalysisComplete => 0,
            SignalKind::Rejected => 2,
            _ => 1,
        }
    }

    /// Observing this kind ends the invocation: nothing useful follows it.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SignalKind::PrdComplete
                | SignalKind::Bailout
                | SignalKind::Blocked
                | SignalKind::AnalysisComplete
                | SignalKind::PlanComplete
                | SignalKind::PlanSkipped
        )
    }

    /// Whether this kind counts as forward progress for idle detection.
    pub fn is_productive(self) -> bool {
        matches!(
            self,
            SignalKind::Verified
                | SignalKind::Rejected
                | SignalKind::PlanComplete
                | SignalKind::PlanUpdated
                | SignalKind::PrdComplete
        )
    }

    /// Whether the single argument is a record id (as opposed to a reason).
    pub(crate) fn first_arg_is_record(self) -> bool {
        matches!(
            self,
            SignalKind::Verified
                | SignalKind::Rejected
                | SignalKind::LoopRisk
                | SignalKind::PlanComplete
                | SignalKind::PlanUpdated
        )
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One parsed control marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    /// Free-text payload: bailout/blocked/skip/rejection reason, or phase name.
    pub detail: Option<String>,
    /// The record the signal concerns, for record-scoped kinds.
    pub record_id: Option<String>,
}

impl Signal {
    /// A signal with no arguments.
    pub fn bare(kind: SignalKind) -> Self {
        Self {
            kind,
            detail: None,
            record_id: None,
        }
    }

    /// Build a signal from its already-split, trimmed arguments.
    ///
    /// Returns `None` when the argument count does not match the kind's arity
    /// or a required argument is empty.
    pub fn from_args(kind: SignalKind, args: &[&str]) -> Option<Self> {
        if args.len() != kind.arity() || args.iter().any(|a| a.is_empty()) {
            return None;
        }
        let signal = match args {
            [] => Self::bare(kind),
            [one] if kind.first_arg_is_record() => Self {
                kind,
                detail: None,
                record_id: Some((*one).to_string()),
            },
            [one] => Self {
                kind,
                detail: Some((*one).to_string()),
                record_id: None,
            },
            [id, reason] => Self {
                kind,
                detail: Some((*reason).to_string()),
                record_id: Some((*id).to_string()),
            },
            _ => return None,
        };
        Some(signal)
    }

    /// Synthesized when the token ceiling is reached.
    pub fn token_limit_bailout() -> Self {
        Self {
            kind: SignalKind::Bailout,
            detail: Some("token limit exceeded".to_string()),
            record_id: None,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(id) = &self.record_id {
            write!(f, ":{id}")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, ":{detail}")?;
        }
        Ok(())
    }
}

/// Signals collected from one invocation, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalSet {
    signals: Vec<Signal>,
}

impl SignalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, signal: Signal) {
        self.signals.push(signal);
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = Signal>) {
        self.signals.extend(other);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Signal> {
        self.signals.iter()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn of_kind(&self, kind: SignalKind) -> impl Iterator<Item = &Signal> {
        self.signals.iter().filter(move |s| s.kind == kind)
    }

    pub fn first(&self, kind: SignalKind) -> Option<&Signal> {
        self.of_kind(kind).next()
    }

    pub fn has(&self, kind: SignalKind) -> bool {
        self.first(kind).is_some()
    }

    pub fn has_terminal(&self) -> bool {
        self.signals.iter().any(|s| s.kind.is_terminal())
    }
}

impl IntoIterator for SignalSet {
    type Item = Signal;
    type IntoIter = std::vec::IntoIter<Signal>;

    fn into_iter(self) -> Self::IntoIter {
        self.signals.into_iter()
    }
}

impl<'a> IntoIterator for &'a SignalSet {
    type Item = &'a Signal;
    type IntoIter = std::slice::Iter<'a, Signal>;

    fn into_iter(self) -> Self::IntoIter {
        self.signals.iter()
    }
}

impl FromIterator<Signal> for SignalSet {
    fn from_iter<T: IntoIterator<Item = Signal>>(iter: T) -> Self {
        Self {
            signals: iter.into_iter().collect(),
        }
    }
}
