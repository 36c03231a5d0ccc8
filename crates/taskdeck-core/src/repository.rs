use anyhow::{Context, anyhow};
use tracing::{debug, error, info, warn};

use crate::datastore::{KeyValueStore, TASKS_KEY, parse_json, save_json};
use crate::task::{Priority, Task, TaskId};

/// Owns the task collection and writes all of it back after every mutation.
///
/// Insertion order is the only order; nothing here sorts.
#[derive(Debug, Default)]
pub struct TaskRepository {
    tasks: Vec<Task>,
}

impl TaskRepository {
    /// Restores the collection from `store`.
    ///
    /// Data that does not parse is quarantined and the repository starts
    /// empty. A store that cannot be read at all is left untouched. Records
    /// written before tasks carried ids are given one and written back so
    /// the ids stay stable across runs.
    #[tracing::instrument(skip(store))]
    pub fn load<S>(store: &mut S) -> Self
    where
        S: KeyValueStore + ?Sized,
    {
        let raw = match store.load(TASKS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => String::new(),
            Err(err) => {
                error!(error = %format!("{err:#}"), "failed to read stored tasks; starting empty");
                return Self::default();
            }
        };

        let (tasks, missing_ids) = match parse_records(&raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                error!(error = %format!("{err:#}"), "stored tasks are unreadable; starting empty");
                if let Err(err) = store.quarantine(TASKS_KEY) {
                    warn!(error = %format!("{err:#}"), "failed to quarantine stored tasks");
                }
                return Self::default();
            }
        };

        info!(count = tasks.len(), "loaded tasks");
        let repo = Self { tasks };
        if missing_ids > 0 {
            info!(missing_ids, "assigning ids to stored tasks");
            repo.persist(store);
        }
        repo
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn id_at(&self, position: usize) -> Option<TaskId> {
        self.tasks.get(position).map(|task| task.id)
    }

    /// Appends a new task. Blank text is rejected without touching state.
    #[tracing::instrument(skip(self, store, text))]
    pub fn create<S>(
        &mut self,
        store: &mut S,
        text: &str,
        due_date: Option<String>,
        priority: Priority,
    ) -> Option<TaskId>
    where
        S: KeyValueStore + ?Sized,
    {
        if text.trim().is_empty() {
            debug!("ignoring task with blank text");
            return None;
        }

        let task = Task::new(text.to_string(), due_date, priority);
        let id = task.id;
        self.tasks.push(task);
        debug!(%id, count = self.tasks.len(), "task created");
        self.persist(store);
        Some(id)
    }

    /// Flips `completed` in place and returns the new value.
    #[tracing::instrument(skip(self, store))]
    pub fn toggle<S>(&mut self, store: &mut S, id: TaskId) -> anyhow::Result<bool>
    where
        S: KeyValueStore + ?Sized,
    {
        let task = self
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| anyhow!("task not found: {id}"))?;
        task.completed = !task.completed;
        let completed = task.completed;

        debug!(%id, completed, "task toggled");
        self.persist(store);
        Ok(completed)
    }

    /// Removes the task when `confirmed`; otherwise does nothing.
    #[tracing::instrument(skip(self, store))]
    pub fn delete<S>(
        &mut self,
        store: &mut S,
        id: TaskId,
        confirmed: bool,
    ) -> anyhow::Result<Option<Task>>
    where
        S: KeyValueStore + ?Sized,
    {
        let idx = self
            .tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or_else(|| anyhow!("task not found: {id}"))?;

        if !confirmed {
            debug!(%id, "delete not confirmed");
            return Ok(None);
        }

        let removed = self.tasks.remove(idx);
        debug!(%id, count = self.tasks.len(), "task deleted");
        self.persist(store);
        Ok(Some(removed))
    }

    pub fn toggle_at<S>(&mut self, store: &mut S, position: usize) -> anyhow::Result<bool>
    where
        S: KeyValueStore + ?Sized,
    {
        let id = self.require_id_at(position)?;
        self.toggle(store, id)
    }

    pub fn delete_at<S>(
        &mut self,
        store: &mut S,
        position: usize,
        confirmed: bool,
    ) -> anyhow::Result<Option<Task>>
    where
        S: KeyValueStore + ?Sized,
    {
        let id = self.require_id_at(position)?;
        self.delete(store, id, confirmed)
    }

    fn require_id_at(&self, position: usize) -> anyhow::Result<TaskId> {
        self.id_at(position).ok_or_else(|| {
            anyhow!(
                "no task at position {position} (collection has {})",
                self.tasks.len()
            )
        })
    }

    // Write failures leave the in-memory collection authoritative.
    fn persist<S>(&self, store: &mut S)
    where
        S: KeyValueStore + ?Sized,
    {
        if let Err(err) = save_json(store, TASKS_KEY, &self.tasks) {
            warn!(
                error = %format!("{err:#}"),
                count = self.tasks.len(),
                "failed to persist tasks"
            );
        }
    }
}

fn parse_records(raw: &str) -> anyhow::Result<(Vec<Task>, usize)> {
    let Some(records) = parse_json::<Vec<serde_json::Value>>(TASKS_KEY, raw)? else {
        return Ok((vec![], 0));
    };
    let missing_ids = records
        .iter()
        .filter(|record| record.get("id").is_none())
        .count();
    let tasks = serde_json::from_value(serde_json::Value::Array(records))
        .context("failed parsing tasks")?;
    Ok((tasks, missing_ids))
}
