use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::phases::Phase;
use crate::signals::SignalKind;
use crate::store::StatusCounts;

/// Kinds that by themselves never make an iteration productive.
const IDLE_KINDS: [SignalKind; 3] = [
    SignalKind::LoopRisk,
    SignalKind::AnalysisComplete,
    SignalKind::Blocked,
];

/// Fingerprint of one iteration, used for idle detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationSnapshot {
    pub counts: StatusCounts,
    pub signal_kinds: BTreeSet<SignalKind>,
}

impl IterationSnapshot {
    pub fn capture(counts: StatusCounts, kinds: impl IntoIterator<Item = SignalKind>) -> Self {
        Self {
            counts,
            signal_kinds: kinds.into_iter().collect(),
        }
    }

    pub fn is_productive(&self) -> bool {
        self.signal_kinds.iter().any(|k| k.is_productive())
    }

    /// No productive kind, and nothing beyond loop-risk / analysis-complete /
    /// blocked markers.
    pub fn is_idle(&self) -> bool {
        !self.is_productive() && self.signal_kinds.iter().all(|k| IDLE_KINDS.contains(k))
    }
}

/// Counts consecutive idle iterations.
#[derive(Debug, Clone)]
pub struct IdleTracker {
    limit: u32,
    consecutive: u32,
}

impl IdleTracker {
    pub fn new(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
            consecutive: 0,
        }
    }

    /// Feed one snapshot. Returns true once the limit is reached.
    pub fn observe(&mut self, snapshot: &IterationSnapshot) -> bool {
        if snapshot.is_idle() {
            self.consecutive += 1;
        } else {
            self.consecutive = 0;
        }
        self.consecutive >= self.limit
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub iteration: u32,
    pub phase: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only log of phase outcomes for one run.
/// Format: `iteration|phase|status|timestamp`
pub struct RunJournal {
    state_file: PathBuf,
}

impl RunJournal {
    pub fn new(state_file: PathBuf) -> Self {
        Self { state_file }
    }

    pub fn save(&self, iteration: u32, phase: Phase, status: &str) -> Result<()> {
        let entry = format!(
            "{}|{}|{}|{}\n",
            iteration,
            phase,
            status,
            Utc::now().to_rfc3339()
        );

        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.state_file)
            .context("Failed to open run journal")?
            .write_all(entry.as_bytes())
            .context("Failed to write journal entry")?;

        Ok(())
    }

    /// Like [`save`](Self::save), but a failure only produces a warning.
    pub fn record(&self, iteration: u32, phase: Phase, status: &str) {
        if let Err(e) = self.save(iteration, phase, status) {
            tracing::warn!(path = %self.state_file.display(), error = %e, "run journal not updated");
        }
    }

    pub fn entries(&self) -> Result<Vec<JournalEntry>> {
        if !self.state_file.exists() {
            return Ok(Vec::new());
        }

        let content =
            fs::read_to_string(&self.state_file).context("Failed to read run journal")?;

        let entries = content
            .lines()
            .filter_map(|line| {
                let parts: Vec<&str> = line.split('|').collect();
                if parts.len() != 4 {
                    return None;
                }
                Some(JournalEntry {
                    iteration: parts[0].parse().unwrap_or(0),
                    phase: parts[1].to_string(),
                    status: parts[2].to_string(),
                    timestamp: DateTime::parse_from_rfc3339(parts[3])
                        .ok()?
                        .with_timezone(&Utc),
                })
            })
            .collect();

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn snapshot(kinds: &[SignalKind]) -> IterationSnapshot {
        IterationSnapshot::capture(StatusCounts::default(), kinds.iter().copied())
    }

    #[test]
    fn test_analysis_and_loop_risk_only_is_idle() {
        let snap = snapshot(&[SignalKind::AnalysisComplete, SignalKind::LoopRisk]);
        assert!(snap.is_idle());
        assert!(!snap.is_productive());
    }

    #[test]
    fn test_verified_is_productive() {
        let snap = snapshot(&[SignalKind::AnalysisComplete, SignalKind::Verified]);
        assert!(!snap.is_idle());
        assert!(snap.is_productive());
    }

    #[test]
    fn test_no_signals_is_idle() {
        assert!(snapshot(&[]).is_idle());
    }

    #[test]
    fn test_bailout_alone_is_not_idle() {
        let snap = snapshot(&[SignalKind::Bailout]);
        assert!(!snap.is_productive());
        assert!(!snap.is_idle());
    }

    #[test]
    fn test_idle_tracker_resets_on_progress() {
        let mut tracker = IdleTracker::new(2);
        let idle = snapshot(&[SignalKind::AnalysisComplete]);
        let busy = snapshot(&[SignalKind::PlanComplete]);

        assert!(!tracker.observe(&idle));
        assert!(!tracker.observe(&busy));
        assert_eq!(tracker.consecutive(), 0);
        assert!(!tracker.observe(&idle));
        assert!(tracker.observe(&idle));
        assert_eq!(tracker.consecutive(), 2);
    }

    #[test]
    fn test_idle_tracker_minimum_limit() {
        let mut tracker = IdleTracker::new(0);
        assert_eq!(tracker.limit(), 1);
        assert!(tracker.observe(&snapshot(&[])));
    }

    #[test]
    fn test_journal_roundtrip() {
        let dir = tempdir().unwrap();
        let journal = RunJournal::new(dir.path().join("state"));
        assert!(journal.entries().unwrap().is_empty());

        journal.save(1, Phase::Planner, "completed").unwrap();
        journal.record(1, Phase::Builder, "skipped");

        let entries = journal.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].iteration, 1);
        assert_eq!(entries[0].phase, "planner");
        assert_eq!(entries[1].status, "skipped");
    }

    #[test]
    fn test_journal_write_failure_is_not_fatal() {
        let dir = tempdir().unwrap();
        let journal = RunJournal::new(dir.path().join("missing/dir/state"));
        journal.record(1, Phase::Reviewer, "failed");
        assert!(journal.save(1, Phase::Reviewer, "failed").is_err());
    }
}
