use sheetrack_core::project::Project;
use sheetrack_core::subtasks::Subtask;

pub fn render_project_line(project: &Project) -> String {
    let name = if project.name.trim().is_empty() {
        "(no name)"
    } else {
        project.name.trim()
    };
    format!(
        "{} | {} | {} | {} | {}/{}",
        project.row,
        project.status,
        project.priority,
        name,
        project.completed_subtasks(),
        project.subtasks.len()
    )
}

/// Numbered from 1, the way the CLI addresses subtasks.
pub fn render_subtask_line(index: usize, subtask: &Subtask) -> String {
    let mark = if subtask.done { "x" } else { " " };
    format!("{}. [{}] {}", index + 1, mark, subtask.text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetrack_core::project::{Priority, Row, Status};

    #[test]
    fn project_line_shows_row_and_subtask_progress() {
        let project = Project {
            row: Row::new(4),
            name: "Launch".to_string(),
            priority: Priority::new(5),
            status: Status::InProgress,
            subtasks: vec![
                Subtask::new("a"),
                Subtask {
                    text: "b".to_string(),
                    done: true,
                },
            ],
        };
        assert_eq!(
            render_project_line(&project),
            "4 | In Progress | 5 | Launch | 1/2"
        );
    }

    #[test]
    fn subtask_line_is_one_based() {
        assert_eq!(render_subtask_line(0, &Subtask::new("draft")), "1. [ ] draft");
    }
}
