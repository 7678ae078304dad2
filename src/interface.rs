use anyhow::{anyhow, bail, Context, Result};
use chrono::{Duration, NaiveDateTime};
use prettytable::{row, Table};
use std::io::{BufRead, Write};
use std::thread;
use std::time::Duration as STDDuration;
use tracing::{info, warn};

use crate::model::{self, Status, Subtask, Task};
use crate::store::Store;

/// Column width used to wrap task and subtask descriptions.
const DESCRIPTION_WIDTH: usize = 48;

/// Turn a relative deadline ("in 2h") into an absolute one.
pub fn deadline_in(now: NaiveDateTime, due_in: STDDuration) -> Result<String> {
    let due_in = Duration::from_std(due_in).context("Deadline is too far in the future.")?;
    let deadline = now
        .checked_add_signed(due_in)
        .ok_or_else(|| anyhow!("Deadline is too far in the future."))?;
    Ok(model::format_timestamp(deadline))
}

pub fn add_task<W: Write>(
    store: &Store,
    out: &mut W,
    description: &str,
    deadline: Option<String>,
    now: NaiveDateTime,
) -> Result<()> {
    let description = description.trim();
    if description.is_empty() {
        bail!("A task cannot be empty.");
    }
    let task = store
        .add_task(description, deadline.as_deref())
        .context("Failed to add task.")?;
    match &task.deadline {
        Some(deadline) => writeln!(
            out,
            "Added #{}: {} (due {})",
            task.id, task.description, deadline
        )?,
        None => writeln!(out, "Added #{}: {}", task.id, task.description)?,
    }
    list(store, out, now)
}

pub fn add_subtask<W: Write>(
    store: &Store,
    out: &mut W,
    task_id: i64,
    description: &str,
    now: NaiveDateTime,
) -> Result<()> {
    let description = description.trim();
    if description.is_empty() {
        bail!("A subtask cannot be empty.");
    }
    let subtask = store
        .add_subtask(task_id, description)
        .with_context(|| format!("Failed to add a subtask to task #{}.", task_id))?;
    writeln!(out, "Added subtask #{} to task #{}: {}", subtask.id, task_id, subtask.description)?;
    list(store, out, now)
}

pub fn set_task_status<W: Write>(
    store: &Store,
    out: &mut W,
    task_id: i64,
    status: Status,
    now: NaiveDateTime,
) -> Result<()> {
    let found = store
        .update_task_status(task_id, status)
        .with_context(|| format!("Failed to update task #{}.", task_id))?;
    if !found {
        writeln!(out, "No task #{}.", task_id)?;
    }
    list(store, out, now)
}

pub fn set_subtask_status<W: Write>(
    store: &Store,
    out: &mut W,
    subtask_id: i64,
    status: Status,
    now: NaiveDateTime,
) -> Result<()> {
    let found = store
        .update_subtask_status(subtask_id, status)
        .with_context(|| format!("Failed to update subtask #{}.", subtask_id))?;
    if !found {
        writeln!(out, "No subtask #{}.", subtask_id)?;
    }
    list(store, out, now)
}

/// Ask a yes/no question. Anything but "y" or "yes" counts as no.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, out: &mut W, question: &str) -> Result<bool> {
    write!(out, "{} [y/N] ", question)?;
    out.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

pub fn remove_task<W: Write>(
    store: &Store,
    out: &mut W,
    task_id: i64,
    now: NaiveDateTime,
) -> Result<()> {
    let found = store
        .delete_task(task_id)
        .with_context(|| format!("Failed to remove task #{}.", task_id))?;
    if found {
        writeln!(out, "Removed task #{}.", task_id)?;
    } else {
        writeln!(out, "No task #{}.", task_id)?;
    }
    list(store, out, now)
}

/// Print every task, pending ones first.
pub fn list<W: Write>(store: &Store, out: &mut W, now: NaiveDateTime) -> Result<()> {
    let tasks = store.load_tasks().context("Failed to load tasks.")?;
    render(store, out, tasks, now)
}

pub fn search<W: Write>(store: &Store, out: &mut W, term: &str, now: NaiveDateTime) -> Result<()> {
    let tasks = store
        .search_tasks(term)
        .with_context(|| format!("Failed to search tasks for '{}'.", term))?;
    if tasks.is_empty() {
        writeln!(out, "No task matches '{}'.", term)?;
        return Ok(());
    }
    render(store, out, tasks, now)
}

/// Print the overdue notification, if there is anything to report.
/// Returns how many tasks are overdue.
pub fn overdue<W: Write>(store: &Store, out: &mut W, now: NaiveDateTime) -> Result<usize> {
    let overdue = store
        .check_overdue(now)
        .context("Failed to check for overdue tasks.")?;
    if overdue.is_empty() {
        writeln!(out, "No overdue tasks.")?;
    } else {
        writeln!(out, "Overdue tasks: {}", overdue.join(", "))?;
    }
    Ok(overdue.len())
}

/// Check for overdue tasks every `interval`, on this thread. A failed check is
/// reported and the next one runs as usual. Runs forever unless `ticks` is
/// set; `Some(0)` runs no check at all.
pub fn watch<W: Write>(
    store: &Store,
    out: &mut W,
    interval: STDDuration,
    ticks: Option<usize>,
) -> Result<()> {
    info!(interval = %humantime::format_duration(interval), "Watching for overdue tasks");
    let mut tick = 0;
    loop {
        if ticks.map_or(false, |ticks| tick >= ticks) {
            return Ok(());
        }
        if tick > 0 {
            thread::sleep(interval);
        }
        tick += 1;

        let now = model::now();
        let overdue = store.check_overdue(now);
        match overdue {
            Ok(overdue) if !overdue.is_empty() => writeln!(
                out,
                "[{}] Overdue tasks: {}",
                model::format_timestamp(now),
                overdue.join(", ")
            )?,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Overdue check failed");
                writeln!(
                    out,
                    "[{}] Failed to check for overdue tasks: {}",
                    model::format_timestamp(now),
                    e
                )?;
            }
        }
        out.flush()?;
    }
}

fn render<W: Write>(
    store: &Store,
    out: &mut W,
    tasks: Vec<Task>,
    now: NaiveDateTime,
) -> Result<()> {
    let (done, pending): (Vec<Task>, Vec<Task>) = tasks.into_iter().partition(Task::is_done);

    for (title, tasks) in [("Pending", pending), ("Done", done)] {
        writeln!(out, "{} ({})", title, tasks.len())?;
        if tasks.is_empty() {
            continue;
        }
        let mut table = Table::new();
        table.set_titles(row!["id", "task", "deadline"]);
        for task in &tasks {
            let subtasks = store
                .load_subtasks(task.id)
                .with_context(|| format!("Failed to load subtasks of task #{}.", task.id))?;
            table.add_row(row![task.id, fmt_task(task, &subtasks), fmt_deadline(task, now)]);
        }
        table.print(out)?;
    }
    Ok(())
}

fn fmt_task(task: &Task, subtasks: &[Subtask]) -> String {
    let mut text = textwrap::fill(&task.description, DESCRIPTION_WIDTH);
    for subtask in subtasks {
        let mark = if subtask.is_done() { "[x]" } else { "[ ]" };
        let prefix = format!("  {} #{} ", mark, subtask.id);
        let indent = " ".repeat(prefix.len());
        let wrapped = textwrap::fill(&subtask.description, DESCRIPTION_WIDTH - prefix.len());
        for (i, line) in wrapped.lines().enumerate() {
            text.push('\n');
            text.push_str(if i == 0 { &prefix } else { &indent });
            text.push_str(line);
        }
    }
    text
}

fn fmt_deadline(task: &Task, now: NaiveDateTime) -> String {
    match &task.deadline {
        Some(deadline) if task.is_overdue(now) => format!("{} (overdue)", deadline),
        Some(deadline) => deadline.clone(),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use tempfile::TempDir;

    fn store() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(StoreConfig::new(dir.path().join("tasks.db"))).unwrap();
        (dir, store)
    }

    fn at(value: &str) -> NaiveDateTime {
        model::parse_timestamp(value).unwrap()
    }

    fn output<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> Result<()>,
    {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn deadline_in_adds_to_now() {
        let deadline =
            deadline_in(at("2025-01-01 10:00:00"), STDDuration::from_secs(90 * 60)).unwrap();
        assert_eq!(deadline, "2025-01-01 11:30:00");
    }

    #[test]
    fn list_splits_pending_and_done_and_shows_subtasks() {
        let (_dir, store) = store();
        let now = at("2025-01-02 00:00:00");
        let milk = store.add_task("Buy milk", Some("2025-01-01 10:00:00")).unwrap();
        let bread = store.add_task("Buy bread", None).unwrap();
        store.add_subtask(milk.id, "Get 2% milk").unwrap();
        store.update_task_status(bread.id, Status::Complete).unwrap();

        let text = output(|out| list(&store, out, now));
        let pending = text.find("Pending (1)").unwrap();
        let done = text.find("Done (1)").unwrap();
        let milk_at = text.find("Buy milk").unwrap();
        let bread_at = text.find("Buy bread").unwrap();
        assert!(pending < milk_at && milk_at < done && done < bread_at);
        assert!(text.contains("[ ] #1 Get 2% milk"));
        assert!(text.contains("2025-01-01 10:00:00 (overdue)"));
    }

    #[test]
    fn empty_descriptions_are_refused() {
        let (_dir, store) = store();
        let mut out = Vec::new();
        assert!(add_task(&store, &mut out, "   ", None, model::now()).is_err());
        assert!(store.load_tasks().unwrap().is_empty());
    }

    #[test]
    fn status_change_on_unknown_id_is_reported() {
        let (_dir, store) = store();
        let text = output(|out| set_task_status(&store, out, 42, Status::Complete, model::now()));
        assert!(text.starts_with("No task #42."));
    }

    #[test]
    fn overdue_lists_descriptions() {
        let (_dir, store) = store();
        store.add_task("Pay rent", Some("2025-01-01 00:00:00")).unwrap();
        store.add_task("File taxes", Some("2025-01-01 12:00:00")).unwrap();
        let mut out = Vec::new();
        let count = overdue(&store, &mut out, at("2025-02-01 00:00:00")).unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Overdue tasks: Pay rent, File taxes\n"
        );
    }

    #[test]
    fn watch_stops_after_ticks() {
        let (_dir, store) = store();
        store.add_task("Pay rent", Some("2000-01-01 00:00:00")).unwrap();
        let text = output(|out| watch(&store, out, STDDuration::from_millis(1), Some(2)));
        assert_eq!(text.matches("Overdue tasks: Pay rent").count(), 2);
    }

    #[test]
    fn watch_with_zero_ticks_checks_nothing() {
        let (_dir, store) = store();
        store.add_task("Pay rent", Some("2000-01-01 00:00:00")).unwrap();
        let text = output(|out| watch(&store, out, STDDuration::from_secs(3600), Some(0)));
        assert_eq!(text, "");
    }

    #[test]
    fn confirm_accepts_only_yes() {
        let ask = |answer: &str| {
            let mut input = std::io::Cursor::new(answer.as_bytes().to_vec());
            let mut out = Vec::new();
            let yes = confirm(&mut input, &mut out, "Remove task #1?").unwrap();
            assert_eq!(String::from_utf8(out).unwrap(), "Remove task #1? [y/N] ");
            yes
        };
        assert!(ask("y\n"));
        assert!(ask("YES\n"));
        assert!(!ask("n\n"));
        assert!(!ask("\n"));
        assert!(!ask(""));
    }

    #[test]
    fn search_without_match_says_so() {
        let (_dir, store) = store();
        store.add_task("Buy milk", None).unwrap();
        let text = output(|out| search(&store, out, "Milk", model::now()));
        assert_eq!(text, "No task matches 'Milk'.\n");
    }
}
