use std::collections::BTreeMap;

use serde::Serialize;

use super::{BuilderData, ChatData, PlannerData, PromptData, ReviewerData};
use crate::paths::{self, PLANS_DIR, PROMPTS_DIR, ProjectPaths, TRIAD_DIR};
use crate::phases::{Phase, builder};
use crate::store::RecordStore;

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "[]".to_string())
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M").to_string()
}

/// Assemble prompt data for `phase` from the store and the project files.
///
/// Returns `None` for the builder when there is no single Active record.
pub fn gather(
    phase: Phase,
    paths: &ProjectPaths,
    store: &RecordStore,
    progress_lines: usize,
    iteration: u32,
) -> Option<PromptData> {
    let progress = paths::read_last_lines(&paths.progress(), progress_lines);
    let augmentation = paths::read_augmentation(&paths.augmentation(phase));

    let data = match phase {
        Phase::Planner => PromptData::Planner(PlannerData {
            codebase_context: paths::read_or_empty(&paths.prompt()),
            open_records_json: to_json(&store.open()),
            progress,
            timestamp: timestamp(),
            plans_dir: format!("{TRIAD_DIR}/{PLANS_DIR}"),
            augmentation,
        }),
        Phase::Builder => {
            let id = builder::target(store)?;
            let record = store.find_by_id(&id)?;
            let plan_content = record
                .active_plan
                .as_deref()
                .map(|p| paths::read_or_empty(&paths.resolve(p)))
                .unwrap_or_default();
            PromptData::Builder(BuilderData {
                codebase_context: paths::read_or_empty(&paths.prompt()),
                record_json: to_json(record),
                plan_path: record.active_plan.clone(),
                plan_content,
                record_id: id,
                progress,
                timestamp: timestamp(),
                augmentation,
            })
        }
        Phase::Reviewer => {
            let active_plans: BTreeMap<String, String> = store
                .records()
                .iter()
                .filter(|r| r.status.holds_plan())
                .filter_map(|r| {
                    let plan = r.active_plan.as_deref()?;
                    let content = paths::read_or_empty(&paths.resolve(plan));
                    (!content.trim().is_empty()).then(|| (r.id.clone(), content))
                })
                .collect();
            let guidance = Phase::LOOP
                .into_iter()
                .map(|p| {
                    (
                        p.name().to_string(),
                        paths::read_augmentation(&paths.augmentation(p)).unwrap_or_default(),
                    )
                })
                .collect();
            PromptData::Reviewer(ReviewerData {
                records_json: to_json(store.records()),
                active_plans,
                progress,
                iteration,
                augmentation,
                guidance,
                prompts_dir: format!("{TRIAD_DIR}/{PROMPTS_DIR}"),
            })
        }
        Phase::Chat => PromptData::Chat(ChatData {
            counts: store.counts(),
            progress_lines: paths::read_or_empty(&paths.progress()).lines().count(),
            has_codebase_context: !paths::read_or_empty(&paths.prompt()).trim().is_empty(),
            augmentation,
        }),
    };
    Some(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Record, Status};
    use tempfile::tempdir;

    fn project() -> (tempfile::TempDir, ProjectPaths) {
        let dir = tempdir().unwrap();
        let paths = ProjectPaths::new(dir.path());
        std::fs::create_dir_all(paths.plans_dir()).unwrap();
        std::fs::create_dir_all(paths.prompts_dir()).unwrap();
        (dir, paths)
    }

    #[test]
    fn test_planner_sees_only_open_records() {
        let (_dir, paths) = project();
        std::fs::write(paths.prompt(), "Rust workspace, use cargo nextest").unwrap();
        let mut done = Record::new("done", "finished", 1);
        done.status = Status::Complete;
        let store = RecordStore::from_records(vec![done, Record::new("todo", "next", 2)]);

        let Some(PromptData::Planner(data)) = gather(Phase::Planner, &paths, &store, 20, 1) else {
            panic!("expected planner data");
        };
        assert!(data.open_records_json.contains("todo"));
        assert!(!data.open_records_json.contains("\"done\""));
        assert_eq!(data.codebase_context, "Rust workspace, use cargo nextest");
        assert_eq!(data.plans_dir, ".triad/plans");
        assert!(data.augmentation.is_none());
    }

    #[test]
    fn test_builder_reads_plan() {
        let (_dir, paths) = project();
        std::fs::write(paths.plan_path("a"), "1. write the parser").unwrap();
        let mut a = Record::new("a", "parser", 1);
        a.status = Status::Active;
        a.active_plan = Some(paths.plan_reference("a"));
        let store = RecordStore::from_records(vec![a]);

        let Some(PromptData::Builder(data)) = gather(Phase::Builder, &paths, &store, 20, 1) else {
            panic!("expected builder data");
        };
        assert_eq!(data.record_id, "a");
        assert_eq!(data.plan_content, "1. write the parser");
    }

    #[test]
    fn test_builder_without_active_record() {
        let (_dir, paths) = project();
        let store = RecordStore::from_records(vec![Record::new("a", "a", 1)]);
        assert!(gather(Phase::Builder, &paths, &store, 20, 1).is_none());
    }

    #[test]
    fn test_reviewer_collects_plans_and_guidance() {
        let (_dir, paths) = project();
        std::fs::write(paths.plan_path("p"), "plan for p").unwrap();
        std::fs::write(paths.augmentation(Phase::Builder), "Run clippy.").unwrap();
        std::fs::write(paths.progress(), "a\nb\nc\n").unwrap();
        let mut p = Record::new("p", "p", 1);
        p.status = Status::Pending;
        p.active_plan = Some(paths.plan_reference("p"));
        let store = RecordStore::from_records(vec![p, Record::new("o", "o", 2)]);

        let Some(PromptData::Reviewer(data)) = gather(Phase::Reviewer, &paths, &store, 2, 4) else {
            panic!("expected reviewer data");
        };
        assert_eq!(data.active_plans.get("p").map(String::as_str), Some("plan for p"));
        assert_eq!(data.guidance.get("builder").map(String::as_str), Some("Run clippy."));
        assert_eq!(data.guidance.get("planner").map(String::as_str), Some(""));
        assert_eq!(data.progress, "b\nc");
        assert_eq!(data.iteration, 4);
    }
}
