//! Next-record selection for the planner.

use super::{Record, RecordStore, Status};

/// Pick the Open record with the lowest priority value.
///
/// Ties go to the record that appears first in the store. Active, Pending
/// and Complete records are never candidates.
pub fn select_next(store: &RecordStore) -> Option<&Record> {
    store
        .records()
        .iter()
        .filter(|r| r.status == Status::Open)
        .min_by_key(|r| r.priority)
}
