use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::project::{Priority, Project, Row, Status};
use crate::summary::{summarize, Summary};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown sort key: {0} (expected priority-desc, priority-asc, status or name)")]
pub struct UnknownSortKey(pub String);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    PriorityDesc,
    PriorityAsc,
    Status,
    Name,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::PriorityDesc => "priority-desc",
            SortKey::PriorityAsc => "priority-asc",
            SortKey::Status => "status",
            SortKey::Name => "name",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = UnknownSortKey;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "" | "priority-desc" => Ok(SortKey::PriorityDesc),
            "priority-asc" => Ok(SortKey::PriorityAsc),
            "status" => Ok(SortKey::Status),
            "name" => Ok(SortKey::Name),
            other => Err(UnknownSortKey(other.to_string())),
        }
    }
}

/// Filter text, status filter and sort key that define a view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewQuery {
    pub text: String,
    pub status: Option<Status>,
    pub sort: SortKey,
}

impl ViewQuery {
    pub fn matches(&self, project: &Project) -> bool {
        let needle = self.text.trim().to_lowercase();
        let matches_text = needle.is_empty() || project.name.to_lowercase().contains(&needle);
        let matches_status = self
            .status
            .as_ref()
            .map(|status| project.status.same_as(status))
            .unwrap_or(true);
        matches_text && matches_status
    }
}

/// Filtered and sorted references into `master`.
///
/// Sorting is stable. Priorities that are not numbers go after every numeric priority in both
/// directions and keep their master order among themselves.
pub fn recompute_view<'a>(master: &'a [Project], query: &ViewQuery) -> Vec<&'a Project> {
    view_indices(master, query)
        .into_iter()
        .map(|idx| &master[idx])
        .collect()
}

fn view_indices(master: &[Project], query: &ViewQuery) -> Vec<usize> {
    let mut indices: Vec<usize> = master
        .iter()
        .enumerate()
        .filter(|(_, project)| query.matches(project))
        .map(|(idx, _)| idx)
        .collect();
    indices.sort_by(|&a, &b| compare(&master[a], &master[b], query.sort));
    indices
}

fn compare(a: &Project, b: &Project, key: SortKey) -> Ordering {
    match key {
        SortKey::PriorityDesc => compare_priority(&a.priority, &b.priority, true),
        SortKey::PriorityAsc => compare_priority(&a.priority, &b.priority, false),
        SortKey::Status => a
            .status
            .rank()
            .cmp(&b.status.rank())
            .then_with(|| compare_names(&a.name, &b.name)),
        SortKey::Name => compare_names(&a.name, &b.name),
    }
}

fn compare_priority(a: &Priority, b: &Priority, descending: bool) -> Ordering {
    match (a.value(), b.value()) {
        (Some(x), Some(y)) if descending => y.cmp(&x),
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Stale,
    Ready { loaded_at: DateTime<Local> },
}

/// Owner of the master collection and the view derived from it.
#[derive(Debug, Clone)]
pub struct ViewState {
    master: Vec<Project>,
    phase: Phase,
    query: ViewQuery,
    // Indices into `master`, rebuilt on every change.
    view: Vec<usize>,
    summary: Summary,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewState {
    pub fn new() -> Self {
        ViewState {
            master: Vec::new(),
            phase: Phase::Stale,
            query: ViewQuery::default(),
            view: Vec::new(),
            summary: summarize(&[]),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.phase, Phase::Ready { .. })
    }

    pub fn loaded_at(&self) -> Option<DateTime<Local>> {
        match self.phase {
            Phase::Ready { loaded_at } => Some(loaded_at),
            Phase::Stale => None,
        }
    }

    /// Replace the master collection wholesale and rebuild everything derived from it.
    pub fn set_master(&mut self, records: Vec<Project>) {
        self.master = records;
        self.phase = Phase::Ready {
            loaded_at: Local::now(),
        };
        self.refresh();
    }

    pub fn master(&self) -> &[Project] {
        &self.master
    }

    pub fn view(&self) -> Vec<&Project> {
        self.view.iter().map(|&idx| &self.master[idx]).collect()
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn query(&self) -> &ViewQuery {
        &self.query
    }

    pub fn set_query(&mut self, query: ViewQuery) {
        self.query = query;
        self.refresh();
    }

    /// Back to no filter text, no status filter, default sort.
    pub fn clear_query(&mut self) {
        self.set_query(ViewQuery::default());
    }

    pub fn project(&self, row: Row) -> Option<&Project> {
        self.master.iter().find(|project| project.row == row)
    }

    /// Mutable access for optimistic subtask edits. Call [`ViewState::refresh`] afterwards.
    pub fn project_mut(&mut self, row: Row) -> Option<&mut Project> {
        self.master.iter_mut().find(|project| project.row == row)
    }

    pub fn refresh(&mut self) {
        self.view = view_indices(&self.master, &self.query);
        self.summary = summarize(&self.master);
    }
}
