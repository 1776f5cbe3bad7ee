//! Persistent requirement record store (`prd.json`).
//!
//! The file is a JSON object `{"prds": [...]}`. A bare array of records is
//! accepted for legacy stores and rewritten in the wrapped form on load.

mod record;
mod selector;

pub use record::{Record, Status};
pub use selector::select_next;

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::StoreError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    prds: Vec<Record>,
}

/// Counts of records per lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub open: usize,
    pub active: usize,
    pub pending: usize,
    pub complete: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.open + self.active + self.pending + self.complete
    }
}

/// In-memory view of the record store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    records: Vec<Record>,
}

impl RecordStore {
    pub fn from_records(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Load the store from `path`.
    ///
    /// An empty (or whitespace-only) file yields an empty store. A legacy bare
    /// array is wrapped and saved back immediately. Duplicate ids are rejected.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let trimmed = content.trim_start();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        let store = if trimmed.starts_with('[') {
            let records: Vec<Record> =
                serde_json::from_str(&content).map_err(|source| StoreError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?;
            let store = Self::from_records(records);
            store.check_unique_ids(path)?;
            tracing::warn!(
                path = %path.display(),
                "record store was a bare array; rewriting as {{\"prds\": [...]}}"
            );
            store.save(path)?;
            store
        } else {
            let file: StoreFile =
                serde_json::from_str(&content).map_err(|source| StoreError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?;
            Self::from_records(file.prds)
        };

        store.check_unique_ids(path)?;
        Ok(store)
    }

    /// Write the store atomically: serialize to a sibling temp file, then rename.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let file = StoreFileRef {
            prds: &self.records,
        };
        let mut json = serde_json::to_string_pretty(&file).map_err(StoreError::Serialize)?;
        json.push('\n');

        let tmp = temp_path(path);
        std::fs::write(&tmp, json).map_err(|source| StoreError::Write {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, path).map_err(|source| {
            let _ = std::fs::remove_file(&tmp);
            StoreError::Write {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    fn check_unique_ids(&self, path: &Path) -> Result<(), StoreError> {
        let mut seen = HashSet::new();
        for record in &self.records {
            if !seen.insert(record.id.as_str()) {
                return Err(StoreError::DuplicateId {
                    path: path.to_path_buf(),
                    id: record.id.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    fn with_status(&self, status: Status) -> Vec<&Record> {
        self.records.iter().filter(|r| r.status == status).collect()
    }

    pub fn open(&self) -> Vec<&Record> {
        self.with_status(Status::Open)
    }

    pub fn active(&self) -> Vec<&Record> {
        self.with_status(Status::Active)
    }

    pub fn pending(&self) -> Vec<&Record> {
        self.with_status(Status::Pending)
    }

    pub fn complete(&self) -> Vec<&Record> {
        self.with_status(Status::Complete)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut Record> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for record in &self.records {
            match record.status {
                Status::Open => counts.open += 1,
                Status::Active => counts.active += 1,
                Status::Pending => counts.pending += 1,
                Status::Complete => counts.complete += 1,
            }
        }
        counts
    }

    /// True when every record is Complete (vacuously true for an empty store).
    pub fn all_complete(&self) -> bool {
        self.records.iter().all(|r| r.status == Status::Complete)
    }

    /// Move a record to `to`, enforcing the lifecycle table.
    ///
    /// Leaving the Active/Pending band clears the plan reference.
    pub fn transition(&mut self, id: &str, to: Status) -> Result<&mut Record, StoreError> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;

        if !record.status.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from: record.status,
                to,
            });
        }

        record.status = to;
        if !to.holds_plan() {
            record.active_plan = None;
        }
        Ok(record)
    }
}

#[derive(Serialize)]
struct StoreFileRef<'a> {
    prds: &'a [Record],
}

fn temp_path(path: &Path) -> std::path::PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "prd.json".to_string());
    path.with_file_name(format!(".{name}.tmp-{}", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("prd.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_wrapped_store() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            r#"{"prds": [
                {"id": "rec-1", "description": "one", "priority": 1, "passes": false},
                {"id": "rec-2", "description": "two", "priority": 2, "passes": "pending"}
            ]}"#,
        );
        let store = RecordStore::load(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.open().len(), 1);
        assert_eq!(store.pending().len(), 1);
        assert_eq!(store.find_by_id("rec-2").unwrap().description, "two");
    }

    #[test]
    fn test_load_empty_file_gives_empty_store() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "  \n");
        let store = RecordStore::load(&path).unwrap();
        assert!(store.is_empty());
        assert!(store.all_complete());
    }

    #[test]
    fn test_load_bare_array_rewrites_file() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            r#"[{"id": "rec-1", "description": "one", "priority": 1, "passes": true}]"#,
        );
        let store = RecordStore::load(&path).unwrap();
        assert_eq!(store.complete().len(), 1);

        let rewritten = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rewritten).unwrap();
        assert!(value.get("prds").is_some_and(|p| p.is_array()));
    }

    #[test]
    fn test_load_rejects_invalid_status() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, r#"{"prds": [{"id": "rec-1", "passes": "done"}]}"#);
        let err = RecordStore::load(&path).unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[test]
    fn test_load_rejects_duplicate_ids() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            r#"{"prds": [{"id": "rec-1", "passes": false}, {"id": "rec-1", "passes": true}]}"#,
        );
        match RecordStore::load(&path).unwrap_err() {
            StoreError::DuplicateId { id, .. } => assert_eq!(id, "rec-1"),
            other => panic!("expected DuplicateId, got {other:?}"),
        }
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let err = RecordStore::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, StoreError::Read { .. }));
    }

    #[test]
    fn test_save_then_load_preserves_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prd.json");
        let mut rec = Record::new("rec-1", "Add login", 1);
        rec.acceptance_criteria = vec!["form renders".into()];
        rec.status = Status::Active;
        rec.active_plan = Some(".triad/plans/rec-1-plan.md".into());
        let store = RecordStore::from_records(vec![rec, Record::new("rec-2", "b", 2)]);

        store.save(&path).unwrap();
        let loaded = RecordStore::load(&path).unwrap();
        assert_eq!(loaded, store);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_transition_follows_lifecycle() {
        let mut store = RecordStore::from_records(vec![Record::new("rec-1", "x", 1)]);
        store.transition("rec-1", Status::Active).unwrap().active_plan =
            Some("plan.md".into());
        store.transition("rec-1", Status::Pending).unwrap();
        assert_eq!(
            store.find_by_id("rec-1").unwrap().active_plan.as_deref(),
            Some("plan.md")
        );
        store.transition("rec-1", Status::Open).unwrap();
        assert!(store.find_by_id("rec-1").unwrap().active_plan.is_none());
    }

    #[test]
    fn test_transition_rejects_illegal_moves() {
        let mut store = RecordStore::from_records(vec![Record::new("rec-1", "x", 1)]);
        let err = store.transition("rec-1", Status::Complete).unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
        assert_eq!(store.find_by_id("rec-1").unwrap().status, Status::Open);

        let err = store.transition("ghost", Status::Active).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_counts() {
        let mut a = Record::new("a", "", 1);
        a.status = Status::Complete;
        let mut b = Record::new("b", "", 1);
        b.status = Status::Active;
        let store = RecordStore::from_records(vec![a, b, Record::new("c", "", 1)]);
        let counts = store.counts();
        assert_eq!(counts.open, 1);
        assert_eq!(counts.active, 1);
        assert_eq!(counts.complete, 1);
        assert_eq!(counts.total(), 3);
        assert!(!store.all_complete());
    }
}
