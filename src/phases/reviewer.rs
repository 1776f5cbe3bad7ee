//! Reviewer: verifies or rejects pending work and tracks plan rewrites.

use std::io::ErrorKind;

use super::{IgnoredSignal, Phase, ReviewerSummary, first_detail};
use crate::paths::ProjectPaths;
use crate::signals::{Signal, SignalKind, SignalSet};
use crate::store::{RecordStore, Status};

/// Runs whenever anything is Pending, Active or Open.
pub fn should_run(store: &RecordStore) -> bool {
    let counts = store.counts();
    counts.pending > 0 || counts.active > 0 || counts.open > 0
}

pub fn skip_reason(store: &RecordStore) -> Option<String> {
    (!should_run(store)).then(|| "no records to review".to_string())
}

/// Note appended to a rejected record.
pub fn rejection_note(reason: &str) -> String {
    format!("Rejected: {reason}")
}

/// Apply every reviewer signal, in emission order.
pub fn apply(
    store: &mut RecordStore,
    signals: &SignalSet,
    paths: &ProjectPaths,
) -> (ReviewerSummary, Vec<IgnoredSignal>) {
    let mut summary = ReviewerSummary::default();
    let mut ignored = Vec::new();

    for signal in signals {
        match signal.kind {
            SignalKind::Verified => {
                if let Some(id) = verify(store, signal, paths, &mut ignored) {
                    push_unique(&mut summary.verified, id);
                }
            }
            SignalKind::Rejected => {
                if let Some(verdict) = reject(store, signal, paths, &summary.rejected, &mut ignored)
                {
                    summary.rejected.push(verdict);
                }
            }
            SignalKind::PlanUpdated => {
                if let Some(id) = known_record(store, signal, &mut ignored) {
                    push_unique(&mut summary.plan_updated, id);
                }
            }
            SignalKind::LoopRisk => {
                if let Some(id) = known_record(store, signal, &mut ignored) {
                    tracing::warn!(record = %id, "loop risk flagged");
                    push_unique(&mut summary.loop_risk, id);
                }
            }
            SignalKind::PromptUpdated => {
                let name = signal.detail.as_deref().unwrap_or_default();
                match Phase::from_name(name) {
                    Some(phase) => push_unique(&mut summary.prompt_updated, phase.name().to_string()),
                    None => ignored.push(IgnoredSignal::new(signal, "unknown phase name")),
                }
            }
            SignalKind::AnalysisComplete => summary.analysis_complete = true,
            _ => {}
        }
    }

    summary.blocked = first_detail(signals, SignalKind::Blocked);
    summary.bailout = first_detail(signals, SignalKind::Bailout);

    (summary, ignored)
}

fn push_unique(list: &mut Vec<String>, id: String) {
    if !list.contains(&id) {
        list.push(id);
    }
}

fn known_record(
    store: &RecordStore,
    signal: &Signal,
    ignored: &mut Vec<IgnoredSignal>,
) -> Option<String> {
    let id = signal.record_id.as_deref()?;
    if store.find_by_id(id).is_none() {
        ignored.push(IgnoredSignal::new(signal, "unknown record"));
        return None;
    }
    Some(id.to_string())
}

fn verify(
    store: &mut RecordStore,
    signal: &Signal,
    paths: &ProjectPaths,
    ignored: &mut Vec<IgnoredSignal>,
) -> Option<String> {
    let id = known_record(store, signal, ignored)?;
    let record = store.find_by_id_mut(&id)?;
    match record.status {
        Status::Pending => {
            record.status = Status::Complete;
        }
        Status::Complete => {}
        status => {
            ignored.push(IgnoredSignal::new(
                signal,
                format!("cannot verify a {status} record"),
            ));
            return None;
        }
    }
    if let Some(plan) = record.active_plan.take() {
        remove_plan(paths, &plan);
    }
    tracing::info!(record = %id, "record verified");
    Some(id)
}

fn reject(
    store: &mut RecordStore,
    signal: &Signal,
    paths: &ProjectPaths,
    rejected: &[(String, String)],
    ignored: &mut Vec<IgnoredSignal>,
) -> Option<(String, String)> {
    let id = known_record(store, signal, ignored)?;
    let reason = signal.detail.clone().unwrap_or_default();
    let note = rejection_note(&reason);
    let record = store.find_by_id_mut(&id)?;
    match record.status {
        Status::Pending => {
            record.status = Status::Open;
        }
        // Duplicate of a rejection already applied in this pass.
        Status::Open if rejected.iter().any(|(r, _)| *r == id) => return None,
        status => {
            ignored.push(IgnoredSignal::new(
                signal,
                format!("cannot reject a {status} record"),
            ));
            return None;
        }
    }
    if !record.notes.contains(&note) {
        record.append_note(&note);
    }
    if let Some(plan) = record.active_plan.take() {
        remove_plan(paths, &plan);
    }
    tracing::info!(record = %id, reason = %reason, "record rejected");
    Some((id, reason))
}

/// Best-effort plan cleanup; a missing file is fine.
fn remove_plan(paths: &ProjectPaths, reference: &str) {
    let path = paths.resolve(reference);
    match std::fs::remove_file(&path) {
        Ok(()) => tracing::debug!(plan = %path.display(), "plan removed"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(plan = %path.display(), error = %e, "failed to remove plan"),
    }
}
