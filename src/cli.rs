use humantime::parse_duration;
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;

use crate::model;

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Add a new task.
    Add {
        /// The task description text.
        #[structopt()]
        description: String,

        /// Deadline as "YYYY-MM-DD HH:MM:SS".
        #[structopt(long, parse(try_from_str = parse_deadline), conflicts_with = "due-in")]
        deadline: Option<String>,

        /// Deadline relative to now (parse_duration), e.g. "2h 30m".
        #[structopt(name = "due-in", long, parse(try_from_str = parse_duration))]
        due_in: Option<Duration>,
    },
    /// Add a subtask to a task.
    Sub {
        #[structopt()]
        task_id: i64,

        #[structopt()]
        description: String,
    },
    /// Mark a task as complete.
    Done {
        #[structopt()]
        task_id: i64,
    },
    /// Mark a task as incomplete again.
    Undo {
        #[structopt()]
        task_id: i64,
    },
    /// Mark a subtask as complete.
    SubDone {
        #[structopt()]
        subtask_id: i64,
    },
    /// Mark a subtask as incomplete again.
    SubUndo {
        #[structopt()]
        subtask_id: i64,
    },
    /// Remove a task together with its subtasks.
    Rm {
        #[structopt()]
        task_id: i64,

        /// Do not ask for confirmation.
        #[structopt(short, long)]
        yes: bool,
    },
    /// List all tasks.
    List,
    /// List the tasks whose description contains a text (case-sensitive).
    Search {
        #[structopt()]
        term: String,
    },
    /// Show incomplete tasks past their deadline.
    Overdue,
    /// Keep checking for overdue tasks.
    Watch {
        /// Time between checks (parse_duration). Defaults to one minute.
        #[structopt(long, parse(try_from_str = parse_duration))]
        interval: Option<Duration>,

        /// Stop after this many checks.
        #[structopt(long)]
        ticks: Option<usize>,
    },
}

#[derive(Debug, StructOpt)]
#[structopt(name = "todo", about = "A to-do list with subtasks and deadlines.")]
pub struct CommandLineArgs {
    #[structopt(subcommand)]
    pub action: Command,

    /// Use a different database file.
    #[structopt(parse(from_os_str), short, long)]
    pub db_file: Option<PathBuf>,

    /// Log more (-v, -vv, -vvv).
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: u8,
}

/// Check a deadline and normalize its spacing.
fn parse_deadline(value: &str) -> Result<String, String> {
    model::parse_timestamp(value)
        .map(model::format_timestamp)
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CommandLineArgs, structopt::clap::Error> {
        CommandLineArgs::from_iter_safe(std::iter::once("todo").chain(args.iter().copied()))
    }

    #[test]
    fn add_accepts_a_deadline() {
        let args = parse(&["add", "Buy milk", "--deadline", "2025-01-01 10:00:00"]).unwrap();
        match args.action {
            Command::Add {
                description,
                deadline,
                due_in,
            } => {
                assert_eq!(description, "Buy milk");
                assert_eq!(deadline.as_deref(), Some("2025-01-01 10:00:00"));
                assert!(due_in.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn add_rejects_malformed_deadline() {
        assert!(parse(&["add", "Buy milk", "--deadline", "next friday"]).is_err());
    }

    #[test]
    fn deadline_and_due_in_conflict() {
        assert!(parse(&[
            "add",
            "Buy milk",
            "--deadline",
            "2025-01-01 10:00:00",
            "--due-in",
            "1h"
        ])
        .is_err());
    }

    #[test]
    fn watch_parses_interval_and_global_options() {
        let args = parse(&["-vv", "-d", "/tmp/t.db", "watch", "--interval", "30s"]).unwrap();
        assert_eq!(args.verbose, 2);
        assert_eq!(args.db_file, Some(PathBuf::from("/tmp/t.db")));
        match args.action {
            Command::Watch { interval, ticks } => {
                assert_eq!(interval, Some(Duration::from_secs(30)));
                assert_eq!(ticks, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn rm_asks_unless_told_not_to() {
        assert!(matches!(
            parse(&["rm", "4"]).unwrap().action,
            Command::Rm { task_id: 4, yes: false }
        ));
        assert!(matches!(
            parse(&["rm", "4", "-y"]).unwrap().action,
            Command::Rm { task_id: 4, yes: true }
        ));
    }

    #[test]
    fn subcommand_names_are_kebab_case() {
        assert!(matches!(
            parse(&["sub-done", "3"]).unwrap().action,
            Command::SubDone { subtask_id: 3 }
        ));
    }
}
