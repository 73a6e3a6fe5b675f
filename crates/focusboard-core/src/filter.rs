use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use focusboard_shared::Task;
use tracing::trace;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default
)]
pub enum FilterMode {
  #[default]
  All,
  Pending,
  Completed
}

impl FilterMode {
  pub fn as_key(self) -> &'static str {
    match self {
      | FilterMode::All => "all",
      | FilterMode::Pending => "pending",
      | FilterMode::Completed => "completed"
    }
  }

  pub fn matches(
    self,
    task: &Task
  ) -> bool {
    match self {
      | FilterMode::All => true,
      | FilterMode::Pending => !task.completed,
      | FilterMode::Completed => task.completed
    }
  }
}

impl fmt::Display for FilterMode {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_key())
  }
}

impl FromStr for FilterMode {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str()
    {
      | "all" => Ok(FilterMode::All),
      | "pending" | "open" => {
        Ok(FilterMode::Pending)
      }
      | "completed" | "done" => {
        Ok(FilterMode::Completed)
      }
      | other => {
        Err(anyhow!(
          "unknown filter: {other} (expected \
           all, pending or completed)"
        ))
      }
    }
  }
}

/// Case-insensitive substring match over
/// title, description and tags. An empty
/// query matches everything.
pub fn matches_search(
  task: &Task,
  query: &str
) -> bool {
  if query.is_empty() {
    return true;
  }
  let q = query.to_lowercase();

  task.title.to_lowercase().contains(&q)
    || task
      .description
      .to_lowercase()
      .contains(&q)
    || task
      .tags
      .iter()
      .any(|tag| tag.to_lowercase().contains(&q))
}

/// Completion filter first, then search.
/// Collection order is kept.
pub fn filter_visible_tasks<'a>(
  tasks: &'a [Task],
  mode: FilterMode,
  query: &str
) -> Vec<&'a Task> {
  let visible: Vec<&Task> = tasks
    .iter()
    .filter(|task| mode.matches(task))
    .filter(|task| matches_search(task, query))
    .collect();
  trace!(
    mode = %mode,
    query,
    total = tasks.len(),
    visible = visible.len(),
    "filtered tasks"
  );
  visible
}

pub fn build_tag_facets(
  tasks: &[Task]
) -> Vec<(String, usize)> {
  let mut counts = BTreeMap::new();
  for task in tasks {
    for tag in &task.tags {
      *counts
        .entry(tag.clone())
        .or_insert(0_usize) += 1;
    }
  }
  counts.into_iter().collect()
}
