use anyhow::anyhow;
use chrono::{Local, NaiveDate};
use tracing::{debug, info, instrument};

use crate::cli::{Command, ListArgs, TaskRef, ThemeAction};
use crate::config::Config;
use crate::confirm::{AssumeYes, Confirm};
use crate::datastore::KeyValueStore;
use crate::render::Renderer;
use crate::state::AppState;
use crate::task::{Priority, TaskId};

/// Runs one command. `prompt` answers delete confirmations unless `--yes`
/// or `confirm = off` waives them.
#[instrument(skip(state, cfg, renderer, prompt, command))]
pub fn dispatch<S: KeyValueStore>(
    state: &mut AppState<S>,
    cfg: &Config,
    renderer: &Renderer,
    prompt: &dyn Confirm,
    command: Command,
) -> anyhow::Result<()> {
    let today = Local::now().date_naive();
    debug!(?command, "dispatching command");

    match command {
        Command::Add {
            text,
            due,
            priority,
        } => cmd_add(state, &text.join(" "), due, priority),
        Command::List(args) => cmd_list(state, renderer, args, today),
        Command::Toggle { task } => cmd_toggle(state, renderer, task),
        Command::Delete { task, yes } => {
            let gate = delete_gate(cfg, yes, prompt)?;
            cmd_delete(state, renderer, task, gate)
        }
        Command::Theme { action } => cmd_theme(state, renderer, action),
    }
}

fn delete_gate<'a>(
    cfg: &Config,
    yes: bool,
    prompt: &'a dyn Confirm,
) -> anyhow::Result<&'a dyn Confirm> {
    if yes || !cfg.confirm_deletes()? {
        debug!(yes, "delete confirmation waived");
        return Ok(&AssumeYes);
    }
    Ok(prompt)
}

fn cmd_add<S: KeyValueStore>(
    state: &mut AppState<S>,
    text: &str,
    due: Option<String>,
    priority: Option<Priority>,
) -> anyhow::Result<()> {
    info!("command add");

    state.set_pending_text(text);
    state.set_pending_due_date(due.unwrap_or_default());
    state.set_pending_priority(priority.unwrap_or_default());

    match state.create() {
        Some(_) => println!("Created task {}.", state.tasks().len()),
        None => println!("Task text is empty; nothing added."),
    }
    Ok(())
}

fn cmd_list<S: KeyValueStore>(
    state: &mut AppState<S>,
    renderer: &Renderer,
    args: ListArgs,
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command list");

    if let Some(status) = args.status {
        state.set_status_filter(status);
    }
    if let Some(search) = args.search {
        state.set_search_term(search);
    }

    let visible = state.visible();
    debug!(
        total = state.tasks().len(),
        visible = visible.len(),
        "listing tasks"
    );
    renderer.print_task_table(&visible, today)
}

fn cmd_toggle<S: KeyValueStore>(
    state: &mut AppState<S>,
    renderer: &Renderer,
    target: TaskRef,
) -> anyhow::Result<()> {
    info!("command toggle");

    let (position, id) = resolve(state, target)?;
    let completed = state.toggle(id)?;
    if let Some(task) = state.task(id) {
        let verb = if completed { "Completed" } else { "Reopened" };
        renderer.print_task_line(verb, position, task);
    }
    Ok(())
}

fn cmd_delete<S: KeyValueStore>(
    state: &mut AppState<S>,
    renderer: &Renderer,
    target: TaskRef,
    confirm: &dyn Confirm,
) -> anyhow::Result<()> {
    info!("command delete");

    let (position, id) = resolve(state, target)?;
    match state.delete(id, confirm)? {
        Some(task) => renderer.print_task_line("Deleted", position, &task),
        None => println!("Task not deleted."),
    }
    Ok(())
}

fn cmd_theme<S: KeyValueStore>(
    state: &mut AppState<S>,
    renderer: &Renderer,
    action: ThemeAction,
) -> anyhow::Result<()> {
    info!(?action, "command theme");

    if action == ThemeAction::Toggle {
        state.toggle_theme();
    }
    renderer.print_theme(state.theme());
    Ok(())
}

/// Maps a command-line task reference to its collection position and id.
pub fn resolve<S: KeyValueStore>(
    state: &AppState<S>,
    target: TaskRef,
) -> anyhow::Result<(usize, TaskId)> {
    match target {
        TaskRef::Position(position) => state
            .id_at(position)
            .map(|id| (position, id))
            .ok_or_else(|| {
                anyhow!(
                    "no task number {} (there are {} tasks)",
                    position + 1,
                    state.tasks().len()
                )
            }),
        TaskRef::Id(id) => state
            .tasks()
            .iter()
            .position(|task| task.id == id)
            .map(|position| (position, id))
            .ok_or_else(|| anyhow!("no task with id {id}")),
        TaskRef::IdPrefix(prefix) => {
            let mut matches = state
                .tasks()
                .iter()
                .enumerate()
                .filter(|(_, task)| task.id.simple().to_string().starts_with(&prefix));
            match (matches.next(), matches.next()) {
                (Some((position, task)), None) => Ok((position, task.id)),
                (Some(_), Some(_)) => Err(anyhow!("id prefix {prefix} matches more than one task")),
                (None, _) => Err(anyhow!("no task with id {prefix}")),
            }
        }
    }
}
