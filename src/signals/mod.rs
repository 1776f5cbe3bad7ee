//! Control signals embedded in agent output.
//!
//! The agent reports phase outcomes with `###KIND###` markers:
//!
//! - `###PRD_COMPLETE###` - builder finished the active record
//! - `###VERIFIED:rec-1###` / `###REJECTED:rec-1:reason###` - reviewer verdicts
//! - `###PLAN_COMPLETE:rec-1###` - planner activated a record
//! - `###BAILOUT:reason###` - early stop with partial progress preserved
//!
//! `WORKING ON: <id>` is recognized separately for display only.

mod parser;
mod types;

pub use parser::{SignalParser, extract_signals, extract_working_on};
pub use types::{Signal, SignalKind, SignalSet};
