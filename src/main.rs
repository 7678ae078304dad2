use anyhow::Context;
use std::io::{self, Write};
use structopt::StructOpt;

use todolist::cli::{Command::*, CommandLineArgs};
use todolist::model::{self, Status};
use todolist::{interface, logging, Config, Store};

fn main() -> anyhow::Result<()> {
    // Get the command-line arguments.
    let CommandLineArgs {
        action,
        db_file,
        verbose,
    } = CommandLineArgs::from_args();

    logging::init_logging(verbose);

    let config = Config::resolve(db_file)?;

    // A database that cannot be opened or migrated is fatal.
    let store = Store::open(config.store.clone()).with_context(|| {
        format!(
            "Failed to initialize the task database at {}.",
            config.store.db_path.display()
        )
    })?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let now = model::now();

    // Perform the action.
    match action {
        Add {
            description,
            deadline,
            due_in,
        } => {
            let deadline = match due_in {
                Some(due_in) => Some(interface::deadline_in(now, due_in)?),
                None => deadline,
            };
            interface::add_task(&store, &mut out, &description, deadline, now)
        }
        Sub {
            task_id,
            description,
        } => interface::add_subtask(&store, &mut out, task_id, &description, now),
        Done { task_id } => {
            interface::set_task_status(&store, &mut out, task_id, Status::Complete, now)
        }
        Undo { task_id } => {
            interface::set_task_status(&store, &mut out, task_id, Status::Incomplete, now)
        }
        SubDone { subtask_id } => {
            interface::set_subtask_status(&store, &mut out, subtask_id, Status::Complete, now)
        }
        SubUndo { subtask_id } => {
            interface::set_subtask_status(&store, &mut out, subtask_id, Status::Incomplete, now)
        }
        Rm { task_id, yes } => {
            let question = format!("Remove task #{} and all its subtasks?", task_id);
            let stdin = io::stdin();
            if yes || interface::confirm(&mut stdin.lock(), &mut out, &question)? {
                interface::remove_task(&store, &mut out, task_id, now)
            } else {
                writeln!(out, "Aborted.").map_err(anyhow::Error::from)
            }
        }
        List => interface::list(&store, &mut out, now),
        Search { term } => interface::search(&store, &mut out, &term, now),
        Overdue => interface::overdue(&store, &mut out, now).map(|_| ()),
        Watch { interval, ticks } => interface::watch(
            &store,
            &mut out,
            interval.unwrap_or(config.overdue_interval),
            ticks,
        ),
    }?;
    Ok(())
}
