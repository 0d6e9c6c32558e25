mod render;
mod version;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sheetrack_core::config::{
    resolve_endpoint_with_source, resolve_header_rows_with_source, resolve_store_settings,
    resolve_timeout_with_source, resolve_token_with_source, update_config, SheetrackConfig,
};
use sheetrack_core::project::{Priority, Project, ProjectDraft, Row, Status};
use sheetrack_core::store::HttpStore;
use sheetrack_core::tracker::{Command as TrackerCommand, Tracker};
use sheetrack_core::view::{SortKey, ViewQuery};

use crate::render::{render_project_line, render_subtask_line};

#[derive(Parser)]
#[command(
    name = "sheetrack",
    version = version::FULL,
    about = "Project tracker backed by a spreadsheet web endpoint"
)]
struct Cli {
    /// Directory holding .sheetrack.toml (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Log requests to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List projects with optional filter and sort
    List {
        /// Case-insensitive substring of the project name
        #[arg(long)]
        search: Option<String>,
        /// Only projects with this status (case-insensitive)
        #[arg(long)]
        status: Option<String>,
        /// priority-desc, priority-asc, status or name
        #[arg(long, default_value = "priority-desc")]
        sort: SortKey,
        #[arg(long)]
        json: bool,
    },
    /// Show completion statistics
    Summary {
        #[arg(long)]
        json: bool,
    },
    /// Append a project
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        priority: i64,
        #[arg(long)]
        status: String,
    },
    /// Change fields of an existing project
    Update {
        #[arg(long)]
        row: u32,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        priority: Option<i64>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Delete one project row
    Delete {
        #[arg(long)]
        row: u32,
    },
    /// Delete every project
    Clear {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Manage the subtasks of a project
    Subtask {
        #[command(subcommand)]
        command: SubtaskCommand,
    },
    /// Inspect or write .sheetrack.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Print version information
    Version,
}

#[derive(Subcommand)]
enum SubtaskCommand {
    List {
        #[arg(long)]
        row: u32,
        #[arg(long)]
        json: bool,
    },
    Add {
        #[arg(long)]
        row: u32,
        text: String,
    },
    /// Mark a subtask done
    Done {
        #[arg(long)]
        row: u32,
        #[arg(long)]
        index: usize,
    },
    /// Mark a subtask not done
    Undo {
        #[arg(long)]
        row: u32,
        #[arg(long)]
        index: usize,
    },
    Rm {
        #[arg(long)]
        row: u32,
        #[arg(long)]
        index: usize,
    },
    Rename {
        #[arg(long)]
        row: u32,
        #[arg(long)]
        index: usize,
        text: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    Show,
    Set {
        #[arg(long)]
        endpoint: Option<String>,
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        timeout_secs: Option<u64>,
        #[arg(long)]
        header_rows: Option<u32>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env("SHEETRACK_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn open_tracker(root: &Path, load: bool) -> Result<Tracker<HttpStore>> {
    let settings = resolve_store_settings(root)?;
    let mut tracker = Tracker::new(HttpStore::new(settings));
    if load {
        tracker.reload().context("failed to load projects")?;
    }
    Ok(tracker)
}

/// A known label, or an unknown one that some loaded project actually carries.
fn status_filter(master: &[Project], text: &str) -> Result<Status> {
    let status = Status::parse(text);
    if status.is_known() || master.iter().any(|project| project.status.same_as(&status)) {
        return Ok(status);
    }
    let mut labels: Vec<&str> = Status::LABELS.to_vec();
    for project in master {
        let label = project.status.label();
        if !project.status.is_known()
            && !labels.iter().any(|seen| seen.eq_ignore_ascii_case(label))
        {
            labels.push(label);
        }
    }
    bail!(
        "Unknown status filter '{}' (expected one of: {})",
        text.trim(),
        labels.join(", ")
    )
}

/// CLI indexes are 1-based.
fn subtask_index(index: usize) -> Result<usize> {
    index
        .checked_sub(1)
        .ok_or_else(|| anyhow!("subtask index starts at 1"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    tracing::debug!(root = %root.display(), "config root");

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Command::List {
            search,
            status,
            sort,
            json,
        } => {
            let mut tracker = open_tracker(&root, true)?;
            let status = status
                .as_deref()
                .map(|text| status_filter(tracker.state().master(), text))
                .transpose()?;
            tracker.set_query(ViewQuery {
                text: search.unwrap_or_default(),
                status,
                sort,
            });
            let view = tracker.state().view();
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                println!("{}", tracker.state().summary());
                if view.is_empty() {
                    println!("(no projects)");
                }
                for project in view {
                    println!("{}", render_project_line(project));
                }
            }
        }
        Command::Summary { json } => {
            let tracker = open_tracker(&root, true)?;
            let summary = tracker.state().summary();
            if json {
                println!("{}", serde_json::to_string_pretty(summary)?);
            } else {
                println!("{}", summary);
            }
        }
        Command::Add {
            name,
            priority,
            status,
        } => {
            let draft = ProjectDraft::new(name, priority, Status::parse(&status));
            draft.validate()?;
            let mut tracker = open_tracker(&root, false)?;
            tracker.dispatch(TrackerCommand::Create(draft))?;
            println!("{}", tracker.state().summary());
        }
        Command::Update {
            row,
            name,
            priority,
            status,
        } => {
            let row = Row::new(row);
            let mut tracker = open_tracker(&root, true)?;
            let current = tracker
                .state()
                .project(row)
                .ok_or_else(|| anyhow!("No project at row {}", row))?;
            let mut draft = current.draft();
            if let Some(name) = name {
                draft.name = name;
            }
            if let Some(priority) = priority {
                draft.priority = Priority::new(priority);
            }
            if let Some(status) = status {
                draft.status = Status::parse(&status);
            }
            tracker.dispatch(TrackerCommand::Update { row, draft })?;
            if let Some(project) = tracker.state().project(row) {
                println!("{}", render_project_line(project));
            }
        }
        Command::Delete { row } => {
            let mut tracker = open_tracker(&root, true)?;
            tracker.dispatch(TrackerCommand::Delete { row: Row::new(row) })?;
            println!("{}", tracker.state().summary());
        }
        Command::Clear { yes } => {
            if !yes {
                bail!("refusing to delete every project without --yes");
            }
            let mut tracker = open_tracker(&root, false)?;
            tracker.dispatch(TrackerCommand::ClearAll)?;
            println!("{}", tracker.state().summary());
        }
        Command::Subtask { command } => run_subtask(&root, command)?,
        Command::Config { command } => run_config(&root, command)?,
        Command::Version => {
            println!("sheetrack {}", version::FULL);
        }
    }
    Ok(())
}

fn run_subtask(root: &Path, command: SubtaskCommand) -> Result<()> {
    let mut tracker = open_tracker(root, true)?;
    let (row, action) = match command {
        SubtaskCommand::List { row, json } => {
            let row = Row::new(row);
            let project = tracker
                .state()
                .project(row)
                .ok_or_else(|| anyhow!("No project at row {}", row))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&project.subtasks)?);
            } else {
                for (index, subtask) in project.subtasks.iter().enumerate() {
                    println!("{}", render_subtask_line(index, subtask));
                }
            }
            return Ok(());
        }
        SubtaskCommand::Add { row, text } => {
            let row = Row::new(row);
            (row, TrackerCommand::AddSubtask { row, text })
        }
        SubtaskCommand::Done { row, index } => {
            let row = Row::new(row);
            let index = subtask_index(index)?;
            (row, TrackerCommand::SetSubtaskDone { row, index, done: true })
        }
        SubtaskCommand::Undo { row, index } => {
            let row = Row::new(row);
            let index = subtask_index(index)?;
            (row, TrackerCommand::SetSubtaskDone { row, index, done: false })
        }
        SubtaskCommand::Rm { row, index } => {
            let row = Row::new(row);
            let index = subtask_index(index)?;
            (row, TrackerCommand::DeleteSubtask { row, index })
        }
        SubtaskCommand::Rename { row, index, text } => {
            let row = Row::new(row);
            let index = subtask_index(index)?;
            (row, TrackerCommand::RenameSubtask { row, index, text })
        }
    };
    tracker.dispatch(action)?;
    if let Some(project) = tracker.state().project(row) {
        for (index, subtask) in project.subtasks.iter().enumerate() {
            println!("{}", render_subtask_line(index, subtask));
        }
    }
    Ok(())
}

fn run_config(root: &Path, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let (endpoint, endpoint_source) = resolve_endpoint_with_source(root)?;
            let (token, token_source) = resolve_token_with_source(root)?;
            let (timeout, timeout_source) = resolve_timeout_with_source(root)?;
            let (header_rows, header_source) = resolve_header_rows_with_source(root)?;
            println!(
                "endpoint: {} ({})",
                endpoint.as_deref().unwrap_or("(unset)"),
                endpoint_source
            );
            println!(
                "token: {} ({})",
                if token.is_some() { "(set)" } else { "(unset)" },
                token_source
            );
            println!("timeout_secs: {} ({})", timeout, timeout_source);
            println!("header_rows: {} ({})", header_rows, header_source);
        }
        ConfigCommand::Set {
            endpoint,
            token,
            timeout_secs,
            header_rows,
        } => {
            let path = update_config(
                root,
                SheetrackConfig {
                    endpoint,
                    token,
                    timeout_secs,
                    header_rows,
                },
            )?;
            println!("wrote {}", path.display());
        }
    }
    Ok(())
}
