use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use tracing::trace;

use crate::task::{
  Task,
  TaskId
};

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub enum StatusFilter {
  #[default]
  All,
  Active,
  Completed
}

impl StatusFilter {
  pub fn matches(
    self,
    task: &Task
  ) -> bool {
    match self {
      | Self::All => true,
      | Self::Active => !task.completed,
      | Self::Completed => task.completed
    }
  }
}

impl fmt::Display for StatusFilter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(match self {
      | Self::All => "All",
      | Self::Active => "Active",
      | Self::Completed => "Completed"
    })
  }
}

impl FromStr for StatusFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(Self::All),
      | "active" => Ok(Self::Active),
      | "completed" | "done" => {
        Ok(Self::Completed)
      }
      | other => Err(anyhow!(
        "invalid status filter: \
         {other} (expected all, \
         active or completed)"
      ))
    }
  }
}

/// A visible task together with its
/// position in the full collection.
#[derive(Debug, Clone, Copy)]
pub struct ViewEntry<'a> {
  pub position: usize,
  pub task:     &'a Task
}

impl ViewEntry<'_> {
  pub fn id(&self) -> TaskId {
    self.task.id
  }
}

/// Case-insensitive substring match;
/// an empty term matches everything.
pub fn matches_search(
  task: &Task,
  needle_lower: &str
) -> bool {
  needle_lower.is_empty()
    || task
      .text
      .to_lowercase()
      .contains(needle_lower)
}

/// Computes the visible subset in
/// collection order. Inputs are left
/// untouched.
#[tracing::instrument(skip(tasks))]
pub fn compute<'a>(
  tasks: &'a [Task],
  status: StatusFilter,
  search_term: &str
) -> Vec<ViewEntry<'a>> {
  let needle = search_term.to_lowercase();

  let visible: Vec<ViewEntry<'a>> = tasks
    .iter()
    .enumerate()
    .filter(|(_, task)| {
      status.matches(task)
        && matches_search(task, &needle)
    })
    .map(|(position, task)| {
      ViewEntry {
        position,
        task
      }
    })
    .collect();

  trace!(
    total = tasks.len(),
    visible = visible.len(),
    "computed view"
  );
  visible
}

#[cfg(test)]
mod tests {
  use super::{
    StatusFilter,
    compute
  };
  use crate::task::{
    Priority,
    Task
  };

  fn task(
    text: &str,
    completed: bool
  ) -> Task {
    let mut task = Task::new(
      text.to_string(),
      None,
      Priority::Medium
    );
    task.completed = completed;
    task
  }

  fn sample() -> Vec<Task> {
    vec![
      task("Buy Milk", false),
      task("Walk dog", true),
      task("milk the cow", true),
      task("Write report", false),
    ]
  }

  fn texts(
    tasks: &[Task],
    status: StatusFilter,
    term: &str
  ) -> Vec<String> {
    compute(tasks, status, term)
      .into_iter()
      .map(|entry| {
        entry.task.text.clone()
      })
      .collect()
  }

  #[test]
  fn status_filters_keep_order() {
    let tasks = sample();

    assert_eq!(
      texts(
        &tasks,
        StatusFilter::Active,
        ""
      ),
      vec!["Buy Milk", "Write report"]
    );
    assert_eq!(
      texts(
        &tasks,
        StatusFilter::Completed,
        ""
      ),
      vec!["Walk dog", "milk the cow"]
    );
    assert_eq!(
      texts(&tasks, StatusFilter::All, "")
        .len(),
      4
    );
  }

  #[test]
  fn search_ignores_case() {
    let tasks = sample();

    for term in ["milk", "MILK", "Milk"] {
      assert_eq!(
        texts(
          &tasks,
          StatusFilter::All,
          term
        ),
        vec!["Buy Milk", "milk the cow"]
      );
    }
  }

  #[test]
  fn both_predicates_must_hold() {
    let tasks = sample();

    let view = compute(
      &tasks,
      StatusFilter::Completed,
      "milk"
    );

    assert_eq!(view.len(), 1);
    assert_eq!(view[0].position, 2);
    assert_eq!(view[0].id(), tasks[2].id);
  }

  #[test]
  fn inputs_are_not_mutated() {
    let tasks = sample();
    let before = tasks.clone();

    let _ = compute(
      &tasks,
      StatusFilter::Active,
      "dog"
    );

    assert_eq!(tasks, before);
  }

  #[test]
  fn status_filter_parses() {
    assert_eq!(
      "Active"
        .parse::<StatusFilter>()
        .unwrap(),
      StatusFilter::Active
    );
    assert!(
      "archived"
        .parse::<StatusFilter>()
        .is_err()
    );
  }
}
