//! Lossy codec for the `Subtasks` cell.
//!
//! The cell may hold a JSON array, a JSON-encoded string, nothing, or garbage left behind by
//! older clients. Decoding never fails: anything unreadable becomes an empty list.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub text: String,
    pub done: bool,
}

impl Subtask {
    pub fn new(text: impl Into<String>) -> Self {
        Subtask {
            text: text.into(),
            done: false,
        }
    }
}

pub fn decode(raw: &Value) -> Vec<Subtask> {
    match raw {
        Value::Array(items) => items.iter().filter_map(decode_item).collect(),
        Value::String(text) => decode_str(text),
        _ => Vec::new(),
    }
}

pub fn decode_str(raw: &str) -> Vec<Subtask> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Array(_)) => decode(&value),
        _ => Vec::new(),
    }
}

pub fn encode(subtasks: &[Subtask]) -> String {
    serde_json::to_string(subtasks).unwrap_or_else(|_| "[]".to_string())
}

fn decode_item(item: &Value) -> Option<Subtask> {
    match item {
        Value::Null => None,
        // Legacy shape: a bare string per subtask.
        Value::String(text) => Some(Subtask::new(text.clone())),
        Value::Object(map) => {
            let text = match map.get("text") {
                Some(Value::String(text)) => text.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            let done = map.get("done").map(is_truthy).unwrap_or(false);
            Some(Subtask { text, done })
        }
        other => Some(Subtask::new(other.to_string())),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(num) => num.as_f64().map(|n| n != 0.0).unwrap_or(false),
        Value::String(text) => {
            let trimmed = text.trim();
            !trimmed.is_empty() && trimmed != "false" && trimmed != "0"
        }
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    }
}
