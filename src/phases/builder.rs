//! Builder: works the single Active record.

use super::{BuilderSummary, IgnoredSignal, first_detail};
use crate::signals::{SignalKind, SignalSet};
use crate::store::{RecordStore, Status};

/// Runs only when exactly one record is Active.
pub fn should_run(store: &RecordStore) -> bool {
    skip_reason(store).is_none()
}

pub fn skip_reason(store: &RecordStore) -> Option<String> {
    let active = store.active();
    match active.len() {
        1 => None,
        0 => Some("no active record".to_string()),
        _ => {
            let ids: Vec<&str> = active.iter().map(|r| r.id.as_str()).collect();
            Some(format!("multiple active records ({})", ids.join(", ")))
        }
    }
}

/// Id of the record the builder will work on.
pub fn target(store: &RecordStore) -> Option<String> {
    match store.active().as_slice() {
        [only] => Some(only.id.clone()),
        _ => None,
    }
}

/// Apply builder signals to `record_id`, the record that was Active when
/// the builder started.
///
/// `PRD_COMPLETE` moves it to Pending. `BAILOUT` leaves it Active.
pub fn apply(
    store: &mut RecordStore,
    signals: &SignalSet,
    record_id: &str,
) -> (BuilderSummary, Vec<IgnoredSignal>) {
    let mut summary = BuilderSummary {
        record_id: record_id.to_string(),
        ..Default::default()
    };
    let mut ignored = Vec::new();

    if let Some(signal) = signals.first(SignalKind::PrdComplete) {
        match store.find_by_id(record_id).map(|r| r.status) {
            None => ignored.push(IgnoredSignal::new(
                signal,
                format!("record {record_id} disappeared from the store"),
            )),
            Some(Status::Pending) => summary.completed = true,
            Some(Status::Active) => match store.transition(record_id, Status::Pending) {
                Ok(_) => {
                    tracing::info!(record = record_id, "record awaiting review");
                    summary.completed = true;
                }
                Err(e) => ignored.push(IgnoredSignal::new(signal, e.to_string())),
            },
            Some(status) => ignored.push(IgnoredSignal::new(
                signal,
                format!("record {record_id} is {status}, not active"),
            )),
        }
    }

    summary.bailout = first_detail(signals, SignalKind::Bailout);
    summary.blocked = first_detail(signals, SignalKind::Blocked);
    if let Some(reason) = &summary.bailout {
        tracing::info!(record = record_id, reason = %reason, "builder bailed out");
    }

    (summary, ignored)
}
