use tracing::{debug, instrument};

use crate::confirm::{Confirm, DELETE_PROMPT};
use crate::datastore::KeyValueStore;
use crate::filter::{StatusFilter, ViewEntry, compute};
use crate::preference::{Theme, ThemePreference};
use crate::repository::TaskRepository;
use crate::task::{Priority, Task, TaskId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub search_term: String,
    pub status_filter: StatusFilter,
}

/// Form fields for the next task. Cleared after a successful create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingInput {
    pub text: String,
    pub due_date: String,
    pub priority: Priority,
}

/// Single owner of everything the presentation layer reads or changes.
///
/// Both persisted pieces (tasks, theme flag) are loaded once in
/// [`AppState::open`] and written back on every mutation.
#[derive(Debug)]
pub struct AppState<S: KeyValueStore> {
    store: S,
    repo: TaskRepository,
    preference: ThemePreference,
    view: ViewState,
    pending: PendingInput,
}

impl<S: KeyValueStore> AppState<S> {
    #[instrument(skip(store))]
    pub fn open(mut store: S) -> Self {
        let repo = TaskRepository::load(&mut store);
        let preference = ThemePreference::load(&store);
        Self {
            store,
            repo,
            preference,
            view: ViewState::default(),
            pending: PendingInput::default(),
        }
    }

    pub fn tasks(&self) -> &[Task] {
        self.repo.tasks()
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.repo.get(id)
    }

    pub fn id_at(&self, position: usize) -> Option<TaskId> {
        self.repo.id_at(position)
    }

    pub fn visible(&self) -> Vec<ViewEntry<'_>> {
        compute(
            self.repo.tasks(),
            self.view.status_filter,
            &self.view.search_term,
        )
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn pending(&self) -> &PendingInput {
        &self.pending
    }

    pub fn is_dark_mode(&self) -> bool {
        self.preference.is_dark()
    }

    pub fn theme(&self) -> Theme {
        self.preference.theme()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn set_pending_text(&mut self, text: impl Into<String>) {
        self.pending.text = text.into();
    }

    pub fn set_pending_due_date(&mut self, due_date: impl Into<String>) {
        self.pending.due_date = due_date.into();
    }

    pub fn set_pending_priority(&mut self, priority: Priority) {
        self.pending.priority = priority;
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.view.search_term = term.into();
    }

    pub fn set_status_filter(&mut self, filter: StatusFilter) {
        self.view.status_filter = filter;
    }

    /// Creates a task from the pending input. A rejected create leaves the
    /// pending input as it was.
    #[instrument(skip(self))]
    pub fn create(&mut self) -> Option<TaskId> {
        let due_date = Some(self.pending.due_date.clone());
        let id = self.repo.create(
            &mut self.store,
            &self.pending.text,
            due_date,
            self.pending.priority,
        )?;
        self.pending = PendingInput::default();
        Some(id)
    }

    #[instrument(skip(self))]
    pub fn toggle(&mut self, id: TaskId) -> anyhow::Result<bool> {
        self.repo.toggle(&mut self.store, id)
    }

    /// Deletes after `confirm` agrees. Nothing is asked for an unknown id.
    #[instrument(skip(self, confirm))]
    pub fn delete(&mut self, id: TaskId, confirm: &dyn Confirm) -> anyhow::Result<Option<Task>> {
        if self.repo.get(id).is_none() {
            return self.repo.delete(&mut self.store, id, false);
        }
        let confirmed = confirm.confirm(DELETE_PROMPT);
        debug!(%id, confirmed, "delete confirmation received");
        self.repo.delete(&mut self.store, id, confirmed)
    }

    #[instrument(skip(self))]
    pub fn toggle_theme(&mut self) -> bool {
        self.preference.toggle(&mut self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::{AssumeNo, AssumeYes};
    use crate::datastore::MemoryStore;

    fn state() -> AppState<MemoryStore> {
        AppState::open(MemoryStore::new())
    }

    #[test]
    fn create_uses_and_resets_pending_input() {
        let mut app = state();
        app.set_pending_text("Buy milk");
        app.set_pending_due_date("2024-01-01");
        app.set_pending_priority(Priority::High);

        let id = app.create().unwrap();

        let task = app.task(id).unwrap();
        assert_eq!(task.due_date.as_deref(), Some("2024-01-01"));
        assert_eq!(task.priority, Priority::High);
        assert_eq!(app.pending(), &PendingInput::default());
    }

    #[test]
    fn rejected_create_keeps_pending_input() {
        let mut app = state();
        app.set_pending_text("   ");
        app.set_pending_priority(Priority::Low);

        assert_eq!(app.create(), None);
        assert_eq!(app.pending().text, "   ");
        assert_eq!(app.pending().priority, Priority::Low);
        assert!(app.tasks().is_empty());
    }

    #[test]
    fn delete_is_gated_by_confirmation() {
        let mut app = state();
        app.set_pending_text("a");
        let id = app.create().unwrap();

        assert_eq!(app.delete(id, &AssumeNo).unwrap(), None);
        assert_eq!(app.tasks().len(), 1);

        assert!(app.delete(id, &AssumeYes).unwrap().is_some());
        assert!(app.tasks().is_empty());
    }

    #[test]
    fn visible_follows_view_state() {
        let mut app = state();
        for text in ["Buy milk", "Call mom"] {
            app.set_pending_text(text);
            app.create();
        }
        let id = app.id_at(1).unwrap();
        app.toggle(id).unwrap();

        app.set_status_filter(StatusFilter::Active);
        let active: Vec<_> = app.visible().iter().map(|e| e.position).collect();
        assert_eq!(active, vec![0]);

        app.set_status_filter(StatusFilter::All);
        app.set_search_term("MOM");
        let found: Vec<_> = app.visible().iter().map(|e| e.id()).collect();
        assert_eq!(found, vec![id]);
    }

    #[test]
    fn theme_toggle_persists_through_store() {
        let mut app = state();

        assert!(app.toggle_theme());

        let reopened = AppState::open(app.store().clone());
        assert!(reopened.is_dark_mode());
        assert_eq!(reopened.theme(), Theme::Dark);
    }
}
