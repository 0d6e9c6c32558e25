//! Sequencing of user actions against the store and the local view state.
//!
//! Project-level writes (create, update, delete, clear) go to the store first and are followed
//! by a full reload; the master collection is never patched speculatively for them. Subtask
//! edits are applied to the local list first and then persisted. If that save fails the local
//! change stays in place and the failure is reported, so local and remote subtask lists can
//! differ until the next reload.
//!
//! Requests are issued one after another from `&mut self`, so an action's follow-up reload
//! always observes its own write. Nothing orders requests made by other clients or processes
//! against the same rows: the last response to land wins.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::project::{DraftError, ProjectDraft, Row};
use crate::store::{ProjectStore, StoreError};
use crate::subtasks::Subtask;
use crate::view::{ViewQuery, ViewState};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error("No project at row {0}")]
    UnknownRow(Row),
    #[error("Row {row} has no subtask #{index} (it has {len})")]
    SubtaskIndex { row: Row, index: usize, len: usize },
    #[error("Subtask text is required")]
    EmptySubtaskText,
    #[error("Subtask change on row {row} was applied locally but not saved: {source}")]
    SubtaskPersist { row: Row, source: StoreError },
}

/// One user action, decoupled from whatever surface produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Reload,
    Create(ProjectDraft),
    Update { row: Row, draft: ProjectDraft },
    Delete { row: Row },
    ClearAll,
    AddSubtask { row: Row, text: String },
    SetSubtaskDone { row: Row, index: usize, done: bool },
    DeleteSubtask { row: Row, index: usize },
    RenameSubtask { row: Row, index: usize, text: String },
}

pub struct Tracker<S> {
    store: S,
    state: ViewState,
}

impl<S: ProjectStore> Tracker<S> {
    pub fn new(store: S) -> Self {
        Tracker {
            store,
            state: ViewState::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn set_query(&mut self, query: ViewQuery) {
        self.state.set_query(query);
    }

    pub fn clear_query(&mut self) {
        self.state.clear_query();
    }

    pub fn dispatch(&mut self, command: Command) -> Result<(), TrackerError> {
        match command {
            Command::Reload => self.reload(),
            Command::Create(draft) => self.create(&draft),
            Command::Update { row, draft } => self.update(row, &draft),
            Command::Delete { row } => self.delete(row),
            Command::ClearAll => self.clear_all(),
            Command::AddSubtask { row, text } => self.add_subtask(row, &text),
            Command::SetSubtaskDone { row, index, done } => {
                self.set_subtask_done(row, index, done)
            }
            Command::DeleteSubtask { row, index } => self.delete_subtask(row, index),
            Command::RenameSubtask { row, index, text } => {
                self.rename_subtask(row, index, &text)
            }
        }
    }

    /// Fetch everything and replace the master collection. On failure the previous state is
    /// left untouched.
    pub fn reload(&mut self) -> Result<(), TrackerError> {
        let projects = self.store.fetch_all()?;
        info!(count = projects.len(), "projects loaded");
        self.state.set_master(projects);
        Ok(())
    }

    pub fn create(&mut self, draft: &ProjectDraft) -> Result<(), TrackerError> {
        draft.validate()?;
        self.store.create(draft)?;
        self.reload()
    }

    pub fn update(&mut self, row: Row, draft: &ProjectDraft) -> Result<(), TrackerError> {
        draft.validate()?;
        self.require_row(row)?;
        self.store.update(row, draft)?;
        self.reload()
    }

    pub fn delete(&mut self, row: Row) -> Result<(), TrackerError> {
        self.require_row(row)?;
        self.store.delete(row)?;
        self.reload()
    }

    pub fn clear_all(&mut self) -> Result<(), TrackerError> {
        self.store.clear_all()?;
        self.reload()
    }

    pub fn add_subtask(&mut self, row: Row, text: &str) -> Result<(), TrackerError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TrackerError::EmptySubtaskText);
        }
        self.edit_subtasks(row, |subtasks| {
            subtasks.push(Subtask::new(text));
            Ok(())
        })
    }

    pub fn set_subtask_done(
        &mut self,
        row: Row,
        index: usize,
        done: bool,
    ) -> Result<(), TrackerError> {
        self.edit_subtasks(row, |subtasks| {
            check_index(row, subtasks, index)?;
            subtasks[index].done = done;
            Ok(())
        })
    }

    pub fn delete_subtask(&mut self, row: Row, index: usize) -> Result<(), TrackerError> {
        self.edit_subtasks(row, |subtasks| {
            check_index(row, subtasks, index)?;
            subtasks.remove(index);
            Ok(())
        })
    }

    /// Replace a subtask's text. Blank text keeps the old text.
    pub fn rename_subtask(
        &mut self,
        row: Row,
        index: usize,
        text: &str,
    ) -> Result<(), TrackerError> {
        let text = text.trim();
        self.edit_subtasks(row, |subtasks| {
            check_index(row, subtasks, index)?;
            if !text.is_empty() {
                subtasks[index].text = text.to_string();
            }
            Ok(())
        })
    }

    fn require_row(&self, row: Row) -> Result<(), TrackerError> {
        self.state
            .project(row)
            .map(|_| ())
            .ok_or(TrackerError::UnknownRow(row))
    }

    fn edit_subtasks<F>(&mut self, row: Row, edit: F) -> Result<(), TrackerError>
    where
        F: FnOnce(&mut Vec<Subtask>) -> Result<(), TrackerError>,
    {
        let project = self
            .state
            .project_mut(row)
            .ok_or(TrackerError::UnknownRow(row))?;
        edit(&mut project.subtasks)?;
        let snapshot = project.subtasks.clone();
        self.state.refresh();

        match self.store.save_subtasks(row, &snapshot) {
            Ok(()) => {
                debug!(%row, count = snapshot.len(), "subtasks saved");
                Ok(())
            }
            Err(source) => {
                warn!(%row, error = %source, "subtask change kept locally but not saved");
                Err(TrackerError::SubtaskPersist { row, source })
            }
        }
    }
}

fn check_index(row: Row, subtasks: &[Subtask], index: usize) -> Result<(), TrackerError> {
    if index < subtasks.len() {
        Ok(())
    } else {
        Err(TrackerError::SubtaskIndex {
            row,
            index,
            len: subtasks.len(),
        })
    }
}
