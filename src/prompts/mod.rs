//! Prompt rendering.
//!
//! Controllers gather a [`PromptData`] from the store and context files and
//! hand it to a [`PromptRenderer`]. [`BuiltinPrompts`] is the stock renderer.

mod builtin;
mod context;

pub use builtin::BuiltinPrompts;
pub use context::gather;

use std::collections::BTreeMap;

use crate::phases::Phase;
use crate::store::StatusCounts;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerData {
    /// Codebase notes from `prompt.md`
    pub codebase_context: String,
    pub open_records_json: String,
    pub progress: String,
    pub timestamp: String,
    /// Project-relative plans directory
    pub plans_dir: String,
    pub augmentation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderData {
    pub codebase_context: String,
    pub record_id: String,
    pub record_json: String,
    pub plan_path: Option<String>,
    pub plan_content: String,
    pub progress: String,
    pub timestamp: String,
    pub augmentation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewerData {
    pub records_json: String,
    /// Record id to plan content, for Active and Pending records
    pub active_plans: BTreeMap<String, String>,
    pub progress: String,
    pub iteration: u32,
    pub augmentation: Option<String>,
    /// Current guidance files, which the reviewer may rewrite
    pub guidance: BTreeMap<String, String>,
    pub prompts_dir: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatData {
    pub counts: StatusCounts,
    pub progress_lines: usize,
    pub has_codebase_context: bool,
    pub augmentation: Option<String>,
}

/// Structured input for one phase prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptData {
    Planner(PlannerData),
    Builder(BuilderData),
    Reviewer(ReviewerData),
    Chat(ChatData),
}

impl PromptData {
    pub fn phase(&self) -> Phase {
        match self {
            PromptData::Planner(_) => Phase::Planner,
            PromptData::Builder(_) => Phase::Builder,
            PromptData::Reviewer(_) => Phase::Reviewer,
            PromptData::Chat(_) => Phase::Chat,
        }
    }
}

/// Turns prompt data into the text sent to the agent.
pub trait PromptRenderer: Send + Sync {
    fn render(&self, data: &PromptData) -> String;
}
