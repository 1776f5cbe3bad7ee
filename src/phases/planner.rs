//! Planner: activates the next open record and points it at a plan.

use super::{IgnoredSignal, PlannerSummary, first_detail};
use crate::paths::ProjectPaths;
use crate::signals::{SignalKind, SignalSet};
use crate::store::{RecordStore, Status};

/// Runs only when nothing is Active and something is Open.
pub fn should_run(store: &RecordStore) -> bool {
    skip_reason(store).is_none()
}

pub fn skip_reason(store: &RecordStore) -> Option<String> {
    if let Some(active) = store.active().first() {
        return Some(format!("active record exists ({})", active.id));
    }
    if store.open().is_empty() {
        return Some("no open records".to_string());
    }
    None
}

/// Apply planner signals. Only the first applicable `PLAN_COMPLETE` is
/// honoured so that at most one record is Active afterwards.
pub fn apply(
    store: &mut RecordStore,
    signals: &SignalSet,
    paths: &ProjectPaths,
) -> (PlannerSummary, Vec<IgnoredSignal>) {
    let mut summary = PlannerSummary::default();
    let mut ignored = Vec::new();

    for signal in signals.of_kind(SignalKind::PlanComplete) {
        let Some(id) = signal.record_id.as_deref() else {
            continue;
        };

        if let Some(planned) = &summary.planned {
            if planned != id {
                ignored.push(IgnoredSignal::new(
                    signal,
                    format!("record {planned} was already planned this turn"),
                ));
            }
            continue;
        }

        let Some(status) = store.find_by_id(id).map(|r| r.status) else {
            ignored.push(IgnoredSignal::new(signal, "unknown record"));
            continue;
        };

        if let Some(other) = store.active().iter().find(|r| r.id != id) {
            ignored.push(IgnoredSignal::new(
                signal,
                format!("record {} is already active", other.id),
            ));
            continue;
        }

        let reference = paths.plan_reference(id);
        let record = match status {
            Status::Open => match store.transition(id, Status::Active) {
                Ok(record) => record,
                Err(e) => {
                    ignored.push(IgnoredSignal::new(signal, e.to_string()));
                    continue;
                }
            },
            // Agent already flipped the record on disk.
            Status::Active => match store.find_by_id_mut(id) {
                Some(record) => record,
                None => continue,
            },
            Status::Pending | Status::Complete => {
                ignored.push(IgnoredSignal::new(
                    signal,
                    format!("cannot plan a {status} record"),
                ));
                continue;
            }
        };

        let plan = record.active_plan.get_or_insert(reference).clone();
        if !paths.resolve(&plan).exists() {
            tracing::warn!(record = id, plan = %plan, "planned record has no plan file yet");
        }
        tracing::info!(record = id, plan = %plan, "record activated");
        summary.planned = Some(id.to_string());
        summary.plan_path = Some(plan);
    }

    summary.skip_reason = first_detail(signals, SignalKind::PlanSkipped);
    summary.blocked = first_detail(signals, SignalKind::Blocked);
    summary.bailout = first_detail(signals, SignalKind::Bailout);

    (summary, ignored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::extract_signals;
    use crate::store::Record;

    fn paths() -> ProjectPaths {
        ProjectPaths::new("/nonexistent-project")
    }

    fn with_status(id: &str, priority: i64, status: Status) -> Record {
        let mut r = Record::new(id, id, priority);
        r.status = status;
        r
    }

    #[test]
    fn test_predicate() {
        let store = RecordStore::from_records(vec![Record::new("a", "a", 1)]);
        assert!(should_run(&store));

        let store = RecordStore::from_records(vec![
            Record::new("a", "a", 1),
            with_status("b", 2, Status::Active),
        ]);
        assert!(!should_run(&store));
        assert_eq!(
            skip_reason(&store).as_deref(),
            Some("active record exists (b)")
        );

        let store = RecordStore::from_records(vec![with_status("a", 1, Status::Pending)]);
        assert_eq!(skip_reason(&store).as_deref(), Some("no open records"));
    }

    #[test]
    fn test_plan_complete_activates_record() {
        let mut store = RecordStore::from_records(vec![Record::new("rec-1", "x", 1)]);
        let signals = extract_signals("###PLAN_COMPLETE:rec-1###");
        let (summary, ignored) = apply(&mut store, &signals, &paths());

        assert!(ignored.is_empty());
        assert_eq!(summary.planned.as_deref(), Some("rec-1"));
        let record = store.find_by_id("rec-1").unwrap();
        assert_eq!(record.status, Status::Active);
        assert_eq!(
            record.active_plan.as_deref(),
            Some(".triad/plans/rec-1-plan.md")
        );
    }

    #[test]
    fn test_only_first_plan_complete_is_honoured() {
        let mut store = RecordStore::from_records(vec![
            Record::new("a", "a", 1),
            Record::new("b", "b", 2),
        ]);
        let signals = extract_signals("###PLAN_COMPLETE:a### ###PLAN_COMPLETE:b###");
        let (summary, ignored) = apply(&mut store, &signals, &paths());

        assert_eq!(summary.planned.as_deref(), Some("a"));
        assert_eq!(ignored.len(), 1);
        assert_eq!(store.active().len(), 1);
        assert_eq!(store.find_by_id("b").unwrap().status, Status::Open);
    }

    #[test]
    fn test_duplicate_plan_complete_is_idempotent() {
        let mut store = RecordStore::from_records(vec![Record::new("a", "a", 1)]);
        let signals = extract_signals("###PLAN_COMPLETE:a### ... ###PLAN_COMPLETE:a###");
        let (summary, ignored) = apply(&mut store, &signals, &paths());
        assert_eq!(summary.planned.as_deref(), Some("a"));
        assert!(ignored.is_empty());
    }

    #[test]
    fn test_agent_written_plan_reference_is_kept() {
        let mut record = with_status("a", 1, Status::Active);
        record.active_plan = Some("docs/custom-plan.md".into());
        let mut store = RecordStore::from_records(vec![record]);
        let signals = extract_signals("###PLAN_COMPLETE:a###");
        let (summary, _) = apply(&mut store, &signals, &paths());
        assert_eq!(summary.plan_path.as_deref(), Some("docs/custom-plan.md"));
    }

    #[test]
    fn test_unknown_and_completed_records_are_ignored() {
        let mut store =
            RecordStore::from_records(vec![with_status("done", 1, Status::Complete)]);
        let signals = extract_signals("###PLAN_COMPLETE:ghost### ###PLAN_COMPLETE:done###");
        let (summary, ignored) = apply(&mut store, &signals, &paths());
        assert!(summary.planned.is_none());
        assert_eq!(ignored.len(), 2);
        assert_eq!(store.find_by_id("done").unwrap().status, Status::Complete);
    }

    #[test]
    fn test_plan_skipped_and_blocked_do_not_mutate() {
        let mut store = RecordStore::from_records(vec![Record::new("a", "a", 1)]);
        let before = store.clone();
        let signals = extract_signals("###BLOCKED:need API key### ###PLAN_SKIPPED:nothing ready###");
        let (summary, _) = apply(&mut store, &signals, &paths());
        assert_eq!(summary.skip_reason.as_deref(), Some("nothing ready"));
        assert_eq!(summary.blocked.as_deref(), Some("need API key"));
        assert_eq!(store, before);
    }
}
