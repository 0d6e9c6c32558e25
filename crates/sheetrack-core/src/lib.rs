//! Core types for sheetrack: a project tracker over a spreadsheet-backed HTTP store.

pub mod config;
pub mod project;
pub mod store;
pub mod subtasks;
pub mod summary;
pub mod tracker;
pub mod view;

#[cfg(test)]
mod test_env;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
