//! Command palette entries and their
//! actions.

use std::fmt;

use anyhow::bail;
use tracing::debug;

use crate::filter::FilterMode;
use crate::store::TaskStore;

/// Only the first few tasks of the
/// collection are offered.
pub const TASK_ENTRY_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryGroup {
  QuickActions,
  Filters,
  Tasks
}

impl fmt::Display for EntryGroup {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(match self {
      | EntryGroup::QuickActions => {
        "Quick Actions"
      }
      | EntryGroup::Filters => "Filters",
      | EntryGroup::Tasks => "Tasks"
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteEntry {
  pub group: EntryGroup,
  pub value: String,
  pub label: String,
  pub hint:  Option<String>
}

impl PaletteEntry {
  fn new(
    group: EntryGroup,
    value: impl Into<String>,
    label: impl Into<String>
  ) -> Self {
    Self {
      group,
      value: value.into(),
      label: label.into(),
      hint: None
    }
  }

  fn hint(
    mut self,
    hint: impl Into<String>
  ) -> Self {
    self.hint = Some(hint.into());
    self
  }

  fn matches(
    &self,
    query: &str
  ) -> bool {
    let q = query.trim().to_lowercase();
    q.is_empty()
      || self.label.to_lowercase().contains(&q)
      || self.value.to_lowercase().contains(&q)
  }
}

pub fn entries(
  store: &TaskStore,
  query: &str
) -> Vec<PaletteEntry> {
  let mut all = vec![
    PaletteEntry::new(
      EntryGroup::QuickActions,
      "new-task",
      "Create New Task"
    )
    .hint("N"),
    PaletteEntry::new(
      EntryGroup::QuickActions,
      "focus-mode",
      "Enter Focus Mode"
    )
    .hint("F"),
    PaletteEntry::new(
      EntryGroup::Filters,
      "filter-all",
      "Show All Tasks"
    ),
    PaletteEntry::new(
      EntryGroup::Filters,
      "filter-pending",
      "Show Pending Tasks"
    ),
    PaletteEntry::new(
      EntryGroup::Filters,
      "filter-completed",
      "Show Completed Tasks"
    ),
  ];

  for task in
    store.tasks().iter().take(TASK_ENTRY_LIMIT)
  {
    let mut entry = PaletteEntry::new(
      EntryGroup::Tasks,
      format!("task:{}", task.id),
      &task.title
    );
    if let Some(tag) = task.tags.first() {
      entry = entry.hint(format!("#{tag}"));
    }
    all.push(entry);
  }

  all.retain(|entry| entry.matches(query));
  all
}

/// Runs the entry identified by `value`.
/// Every known entry closes the palette;
/// an unknown value is an error and
/// changes nothing.
pub fn execute(
  store: &mut TaskStore,
  value: &str
) -> anyhow::Result<()> {
  debug!(value, "palette select");
  if let Some(id) = value.strip_prefix("task:")
  {
    store.set_selected_task_id(Some(id));
    store.set_command_open(false);
    return Ok(());
  }

  match value {
    | "new-task" => store.set_creating(true),
    | "focus-mode" => {
      store.toggle_focus_mode(None)
    }
    | "filter-all" => {
      store.set_filter(FilterMode::All)
    }
    | "filter-pending" => {
      store.set_filter(FilterMode::Pending)
    }
    | "filter-completed" => {
      store.set_filter(FilterMode::Completed)
    }
    | other => {
      bail!("unknown palette entry: {other}")
    }
  }
  store.set_command_open(false);
  Ok(())
}
