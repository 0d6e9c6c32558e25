use std::fmt;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::project::{Project, ProjectDraft, Row};
use crate::subtasks::{self, Subtask};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operation {
    FetchAll,
    Create,
    Update,
    Delete,
    SaveSubtasks,
    ClearAll,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::FetchAll => "fetch",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::SaveSubtasks => "save subtasks",
            Operation::ClearAll => "clear all",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{operation} failed: transport error: {message}")]
    Transport {
        operation: Operation,
        message: String,
    },
    #[error("{operation} failed: HTTP status {status}")]
    HttpStatus { operation: Operation, status: u16 },
    #[error("Failed to decode project list: {0}")]
    Decode(String),
}

/// Access to the remote sheet. One call is one request; nothing is retried or batched.
pub trait ProjectStore {
    /// All rows in sheet order, each stamped with its row.
    fn fetch_all(&self) -> Result<Vec<Project>, StoreError>;
    fn create(&self, draft: &ProjectDraft) -> Result<(), StoreError>;
    fn update(&self, row: Row, draft: &ProjectDraft) -> Result<(), StoreError>;
    fn delete(&self, row: Row) -> Result<(), StoreError>;
    fn clear_all(&self) -> Result<(), StoreError>;
    /// Replace the whole subtask list of `row`. Last write wins.
    fn save_subtasks(&self, row: Row, subtasks: &[Subtask]) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy)]
pub enum StoreRequest<'a> {
    FetchAll,
    Create(&'a ProjectDraft),
    Update(Row, &'a ProjectDraft),
    Delete(Row),
    SaveSubtasks(Row, &'a [Subtask]),
    ClearAll,
}

impl StoreRequest<'_> {
    pub fn operation(&self) -> Operation {
        match self {
            StoreRequest::FetchAll => Operation::FetchAll,
            StoreRequest::Create(_) => Operation::Create,
            StoreRequest::Update(..) => Operation::Update,
            StoreRequest::Delete(_) => Operation::Delete,
            StoreRequest::SaveSubtasks(..) => Operation::SaveSubtasks,
            StoreRequest::ClearAll => Operation::ClearAll,
        }
    }

    pub fn row(&self) -> Option<Row> {
        match self {
            StoreRequest::Update(row, _)
            | StoreRequest::Delete(row)
            | StoreRequest::SaveSubtasks(row, _) => Some(*row),
            _ => None,
        }
    }
}

/// Query parameters for a request, token first.
pub fn query_pairs(token: &str, request: &StoreRequest<'_>) -> Vec<(&'static str, String)> {
    let mut pairs = vec![("token", token.to_string())];
    match request {
        StoreRequest::FetchAll => {}
        StoreRequest::Create(draft) => push_draft(&mut pairs, draft),
        StoreRequest::Update(row, draft) => {
            pairs.push(("row", row.to_string()));
            pairs.push(("update", "1".to_string()));
            push_draft(&mut pairs, draft);
        }
        StoreRequest::Delete(row) => {
            pairs.push(("row", row.to_string()));
            pairs.push(("delete", "1".to_string()));
        }
        StoreRequest::SaveSubtasks(row, list) => {
            pairs.push(("row", row.to_string()));
            pairs.push(("updateSubtasks", "1".to_string()));
            pairs.push(("subtasks", subtasks::encode(list)));
        }
        StoreRequest::ClearAll => pairs.push(("clearAll", "1".to_string())),
    }
    pairs
}

fn push_draft(pairs: &mut Vec<(&'static str, String)>, draft: &ProjectDraft) {
    pairs.push(("Name", draft.name.trim().to_string()));
    pairs.push(("Priority", draft.priority.to_string()));
    pairs.push(("Status", draft.status.label().to_string()));
}

/// Decode the list response. Anything short of a JSON array of objects fails the whole fetch.
pub fn decode_project_list(body: &str, header_rows: u32) -> Result<Vec<Project>, StoreError> {
    let value: Value =
        serde_json::from_str(body).map_err(|err| StoreError::Decode(err.to_string()))?;
    let Value::Array(records) = value else {
        return Err(StoreError::Decode("expected a JSON array".to_string()));
    };
    records
        .iter()
        .enumerate()
        .map(|(index, record)| match record {
            Value::Object(map) => Ok(Project::from_record(
                Row::from_index(index, header_rows),
                map,
            )),
            other => Err(StoreError::Decode(format!(
                "record {} is not an object: {}",
                index, other
            ))),
        })
        .collect()
}

#[derive(Clone)]
pub struct StoreSettings {
    pub endpoint: String,
    pub token: String,
    pub timeout: Duration,
    pub header_rows: u32,
}

impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSettings")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("header_rows", &self.header_rows)
            .finish()
    }
}

/// [`ProjectStore`] over the sheet's HTTP endpoint.
#[derive(Debug)]
pub struct HttpStore {
    settings: StoreSettings,
    agent: ureq::Agent,
}

impl HttpStore {
    pub fn new(settings: StoreSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(settings.timeout)
            .user_agent(concat!("sheetrack/", env!("CARGO_PKG_VERSION")))
            .build();
        HttpStore { settings, agent }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    fn send(&self, request: StoreRequest<'_>) -> Result<String, StoreError> {
        let operation = request.operation();
        debug!(%operation, row = ?request.row(), "store request");
        let mut call = self.agent.get(&self.settings.endpoint);
        for (key, value) in query_pairs(&self.settings.token, &request) {
            call = call.query(key, &value);
        }
        let response = match call.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                return Err(StoreError::HttpStatus { operation, status })
            }
            Err(ureq::Error::Transport(err)) => {
                return Err(StoreError::Transport {
                    operation,
                    message: transport_message(&err),
                })
            }
        };
        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(StoreError::HttpStatus { operation, status });
        }
        response.into_string().map_err(|err| StoreError::Transport {
            operation,
            message: redact_token(&err.to_string()),
        })
    }
}

/// Describe a transport failure without ureq's `Display`, which prints the request URL
/// (and with it the token).
fn transport_message(err: &ureq::Transport) -> String {
    let mut message = err.kind().to_string();
    if let Some(detail) = err.message() {
        message.push_str(": ");
        message.push_str(detail);
    }
    if let Some(source) = std::error::Error::source(err) {
        message.push_str(": ");
        message.push_str(&source.to_string());
    }
    redact_token(&message)
}

/// Mask any `token=` query value left in `text`.
fn redact_token(text: &str) -> String {
    let mut text = text.to_string();
    let mut from = 0;
    while let Some(found) = text[from..].find("token=") {
        let start = from + found + "token=".len();
        let end = text[start..]
            .find(|c: char| c == '&' || c == '#' || c.is_whitespace())
            .map_or(text.len(), |offset| start + offset);
        text.replace_range(start..end, "<redacted>");
        from = start + "<redacted>".len();
    }
    text
}

impl ProjectStore for HttpStore {
    fn fetch_all(&self) -> Result<Vec<Project>, StoreError> {
        let body = self.send(StoreRequest::FetchAll)?;
        decode_project_list(&body, self.settings.header_rows)
    }

    fn create(&self, draft: &ProjectDraft) -> Result<(), StoreError> {
        self.send(StoreRequest::Create(draft)).map(|_| ())
    }

    fn update(&self, row: Row, draft: &ProjectDraft) -> Result<(), StoreError> {
        self.send(StoreRequest::Update(row, draft)).map(|_| ())
    }

    fn delete(&self, row: Row) -> Result<(), StoreError> {
        self.send(StoreRequest::Delete(row)).map(|_| ())
    }

    fn clear_all(&self) -> Result<(), StoreError> {
        self.send(StoreRequest::ClearAll).map(|_| ())
    }

    fn save_subtasks(&self, row: Row, subtasks: &[Subtask]) -> Result<(), StoreError> {
        self.send(StoreRequest::SaveSubtasks(row, subtasks))
            .map(|_| ())
    }
}
