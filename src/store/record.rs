//! Requirement record and its four-state lifecycle.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Lifecycle state of a requirement record.
///
/// On the wire this is the legacy `passes` field: `false` (open),
/// `"active"`, `"pending"`, or `true` (complete). Anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// Not attempted yet, or rejected by the reviewer.
    #[default]
    Open,
    /// Selected and planned; the builder works on it.
    Active,
    /// Builder claims completion; awaiting review.
    Pending,
    /// Verified by the reviewer. Terminal.
    Complete,
}

impl Status {
    /// Whether the lifecycle allows moving from `self` to `to`.
    ///
    /// | From    | To       | Trigger                     |
    /// |---------|----------|-----------------------------|
    /// | Open    | Active   | planner plans the record    |
    /// | Active  | Pending  | builder `PRD_COMPLETE`      |
    /// | Active  | Active   | builder `BAILOUT`           |
    /// | Pending | Complete | reviewer `VERIFIED`         |
    /// | Pending | Open     | reviewer `REJECTED`         |
    pub fn can_transition_to(self, to: Status) -> bool {
        matches!(
            (self, to),
            (Status::Open, Status::Active)
                | (Status::Active, Status::Pending)
                | (Status::Active, Status::Active)
                | (Status::Pending, Status::Complete)
                | (Status::Pending, Status::Open)
        )
    }

    /// Whether a plan reference may be attached in this state.
    pub fn holds_plan(self) -> bool {
        matches!(self, Status::Active | Status::Pending)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Open => write!(f, "open"),
            Status::Active => write!(f, "active"),
            Status::Pending => write!(f, "pending"),
            Status::Complete => write!(f, "complete"),
        }
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Status::Open => serializer.serialize_bool(false),
            Status::Active => serializer.serialize_str("active"),
            Status::Pending => serializer.serialize_str("pending"),
            Status::Complete => serializer.serialize_bool(true),
        }
    }
}

struct StatusVisitor;

impl Visitor<'_> for StatusVisitor {
    type Value = Status;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("false, true, \"active\" or \"pending\"")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Status, E> {
        Ok(if v { Status::Complete } else { Status::Open })
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Status, E> {
        match v {
            "active" => Ok(Status::Active),
            "pending" => Ok(Status::Pending),
            other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
        }
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(StatusVisitor)
    }
}

/// A single unit of work with acceptance criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    /// Lower value means higher priority.
    #[serde(default)]
    pub priority: i64,
    #[serde(rename = "passes", default)]
    pub status: Status,
    #[serde(default)]
    pub notes: String,
    /// Project-relative path of the plan document while Active or Pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_plan: Option<String>,
}

impl Record {
    pub fn new(id: impl Into<String>, description: impl Into<String>, priority: i64) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            acceptance_criteria: Vec::new(),
            priority,
            status: Status::Open,
            notes: String::new(),
            active_plan: None,
        }
    }

    /// Append a line to the notes, separating from earlier notes with a newline.
    pub fn append_note(&mut self, note: &str) {
        if !self.notes.is_empty() && !self.notes.ends_with('\n') {
            self.notes.push('\n');
        }
        self.notes.push_str(note);
    }
}
