use std::fmt;

use serde::Serialize;

use crate::project::{Project, Status};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub complete: usize,
    pub percent: f64,
}

pub fn summarize(projects: &[Project]) -> Summary {
    let total = projects.len();
    let complete = projects
        .iter()
        .filter(|project| project.status == Status::Complete)
        .count();
    let percent = if total == 0 {
        0.0
    } else {
        100.0 * complete as f64 / total as f64
    };
    Summary {
        total,
        complete,
        percent,
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.total == 1 { "project" } else { "projects" };
        write!(
            f,
            "{} {} · {} complete ({:.1}%)",
            self.total, noun, self.complete, self.percent
        )
    }
}
