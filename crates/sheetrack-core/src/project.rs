use std::fmt;

use serde::ser::{Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::subtasks::{self, Subtask};

/// 1-based row of a record in the remote sheet, header rows included.
///
/// Stamped once when the record is fetched and carried on the record from then on. It is the
/// only handle the store accepts for update/delete, so it must never be derived from where a
/// project happens to sit in a filtered or sorted view.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct Row(u32);

impl Row {
    pub fn new(value: u32) -> Self {
        Row(value)
    }

    /// Row for the record at `index` (0-based) of a fetched list. Saturates at `u32::MAX`.
    pub fn from_index(index: usize, header_rows: u32) -> Self {
        let index = u32::try_from(index).unwrap_or(u32::MAX);
        Row(index.saturating_add(1).saturating_add(header_rows))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    NotStarted,
    InProgress,
    Complete,
    /// Anything the store holds that is not one of the three known labels, kept verbatim.
    Other(String),
}

impl Status {
    pub const LABELS: [&'static str; 3] = ["Not Started", "In Progress", "Complete"];

    pub fn parse(text: &str) -> Self {
        let lc = text.trim().to_lowercase();
        match lc.as_str() {
            "not started" => Status::NotStarted,
            "in progress" => Status::InProgress,
            "complete" => Status::Complete,
            _ => Status::Other(text.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Status::NotStarted => "Not Started",
            Status::InProgress => "In Progress",
            Status::Complete => "Complete",
            Status::Other(raw) => raw.as_str(),
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Status::NotStarted => 0,
            Status::InProgress => 1,
            Status::Complete => 2,
            Status::Other(_) => 99,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Status::Other(_))
    }

    /// Equality as a filter sees it: unknown labels compare case-insensitively, like the
    /// known ones do through `parse`.
    pub fn same_as(&self, other: &Status) -> bool {
        match (self, other) {
            (Status::Other(a), Status::Other(b)) => a.to_lowercase() == b.to_lowercase(),
            _ => self == other,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Priority as the store holds it.
///
/// Well-formed values are integers 1-5, but the sheet is free text, so a cell that is not a
/// number keeps its raw text and has no numeric value ("NaN" for ordering purposes).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Priority {
    value: Option<i64>,
    raw: String,
}

impl Priority {
    pub const MIN: i64 = 1;
    pub const MAX: i64 = 5;

    pub fn new(value: i64) -> Self {
        Priority {
            value: Some(value),
            raw: value.to_string(),
        }
    }

    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let value = trimmed
            .parse::<f64>()
            .ok()
            .filter(|num| num.is_finite())
            .map(|num| num.trunc() as i64);
        Priority {
            value,
            raw: trimmed.to_string(),
        }
    }

    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(num) => match num.as_i64() {
                Some(int) => Priority::new(int),
                None => Priority::parse(&num.to_string()),
            },
            Value::String(text) => Priority::parse(text),
            Value::Bool(flag) => Priority::parse(&flag.to_string()),
            _ => Priority::parse(""),
        }
    }

    pub fn value(&self) -> Option<i64> {
        self.value
    }

    pub fn is_nan(&self) -> bool {
        self.value.is_none()
    }

    pub fn in_range(&self) -> bool {
        self.value
            .map(|value| (Self::MIN..=Self::MAX).contains(&value))
            .unwrap_or(false)
    }

    pub fn as_raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(value) => write!(f, "{}", value),
            None => f.write_str(&self.raw),
        }
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value {
            Some(value) => serializer.serialize_i64(value),
            None => serializer.serialize_str(&self.raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Project {
    pub row: Row,
    pub name: String,
    pub priority: Priority,
    pub status: Status,
    pub subtasks: Vec<Subtask>,
}

impl Project {
    /// Build a project from one record of the list response.
    ///
    /// Missing fields fall back to empty values; `Subtasks` goes through the lossy codec.
    pub fn from_record(row: Row, record: &Map<String, Value>) -> Self {
        let name = record
            .get("Name")
            .and_then(value_to_string)
            .unwrap_or_default()
            .trim()
            .to_string();
        let priority = record
            .get("Priority")
            .map(Priority::from_value)
            .unwrap_or_else(|| Priority::parse(""));
        let status = Status::parse(
            &record
                .get("Status")
                .and_then(value_to_string)
                .unwrap_or_default(),
        );
        let subtasks = record
            .get("Subtasks")
            .map(subtasks::decode)
            .unwrap_or_default();
        Project {
            row,
            name,
            priority,
            status,
            subtasks,
        }
    }

    pub fn completed_subtasks(&self) -> usize {
        self.subtasks.iter().filter(|subtask| subtask.done).count()
    }

    pub fn draft(&self) -> ProjectDraft {
        ProjectDraft {
            name: self.name.clone(),
            priority: self.priority.clone(),
            status: self.status.clone(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("Project name is required")]
    EmptyName,
    #[error("Priority must be a number between 1 and 5, got: {0}")]
    PriorityOutOfRange(String),
    #[error("Status must be one of Not Started, In Progress, Complete, got: {0}")]
    UnknownStatus(String),
}

/// User-supplied fields for a create or update.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDraft {
    pub name: String,
    pub priority: Priority,
    pub status: Status,
}

impl ProjectDraft {
    pub fn new(name: impl Into<String>, priority: i64, status: Status) -> Self {
        ProjectDraft {
            name: name.into(),
            priority: Priority::new(priority),
            status,
        }
    }

    pub fn validate(&self) -> Result<(), DraftError> {
        if self.name.trim().is_empty() {
            return Err(DraftError::EmptyName);
        }
        if !self.priority.in_range() {
            return Err(DraftError::PriorityOutOfRange(
                self.priority.as_raw().to_string(),
            ));
        }
        if !self.status.is_known() {
            return Err(DraftError::UnknownStatus(self.status.label().to_string()));
        }
        Ok(())
    }
}

pub(crate) fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(val) => Some(val.clone()),
        Value::Number(num) => Some(num.to_string()),
        Value::Bool(val) => Some(val.to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
