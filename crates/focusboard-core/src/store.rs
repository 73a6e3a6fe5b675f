//! The task store: the single owner of
//! task data, selection, modal flags,
//! filter/search state and the Pomodoro
//! timer.
//!
//! The store is a plain value owned by
//! the application root and handed to
//! consumers by reference. Every
//! mutation is synchronous and total.

use focusboard_shared::Task;
use tracing::{
  debug,
  trace
};

use crate::filter::{
  FilterMode,
  build_tag_facets,
  filter_visible_tasks
};

pub const DEFAULT_POMODORO_SECS: u32 =
  25 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Up,
  Down
}

/// What `set_selected_task_id` does with
/// an id that is not in the current
/// filtered view. The index is 0 either
/// way.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default
)]
pub enum SelectionFallback {
  /// Keep the requested id.
  #[default]
  FirstRow,
  /// Drop the id so nothing unrelated
  /// looks selected.
  Clear
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PomodoroState {
  pub session_secs:   u32,
  pub remaining_secs: u32,
  pub running:        bool,
  pub task_id:        Option<String>
}

impl PomodoroState {
  pub fn new(session_secs: u32) -> Self {
    Self {
      session_secs,
      remaining_secs: session_secs,
      running: false,
      task_id: None
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default
)]
pub struct TaskStats {
  pub total:           usize,
  pub completed:       usize,
  pub pending:         usize,
  pub completion_rate: u32,
  pub focus_minutes:   u64
}

#[derive(Debug, Clone)]
pub struct TaskStore {
  tasks:              Vec<Task>,
  selected_task_id:   Option<String>,
  selected_index:     usize,
  command_open:       bool,
  focus_mode:         bool,
  focused_task_id:    Option<String>,
  editing_task_id:    Option<String>,
  creating:           bool,
  filter:             FilterMode,
  search_query:       String,
  pomodoro:           PomodoroState,
  selection_fallback: SelectionFallback
}

impl Default for TaskStore {
  fn default() -> Self {
    Self::new(
      DEFAULT_POMODORO_SECS,
      SelectionFallback::default()
    )
  }
}

impl TaskStore {
  pub fn new(
    pomodoro_secs: u32,
    selection_fallback: SelectionFallback
  ) -> Self {
    Self {
      tasks: Vec::new(),
      selected_task_id: None,
      selected_index: 0,
      command_open: false,
      focus_mode: false,
      focused_task_id: None,
      editing_task_id: None,
      creating: false,
      filter: FilterMode::All,
      search_query: String::new(),
      pomodoro: PomodoroState::new(
        pomodoro_secs
      ),
      selection_fallback
    }
  }

  pub fn tasks(&self) -> &[Task] {
    &self.tasks
  }

  pub fn task(
    &self,
    id: &str
  ) -> Option<&Task> {
    self.tasks.iter().find(|t| t.id == id)
  }

  pub fn selected_task_id(
    &self
  ) -> Option<&str> {
    self.selected_task_id.as_deref()
  }

  pub fn selected_index(&self) -> usize {
    self.selected_index
  }

  pub fn is_command_open(&self) -> bool {
    self.command_open
  }

  pub fn is_focus_mode(&self) -> bool {
    self.focus_mode
  }

  pub fn focused_task_id(
    &self
  ) -> Option<&str> {
    self.focused_task_id.as_deref()
  }

  pub fn is_editing(&self) -> bool {
    self.editing_task_id.is_some()
  }

  pub fn editing_task_id(
    &self
  ) -> Option<&str> {
    self.editing_task_id.as_deref()
  }

  pub fn is_creating(&self) -> bool {
    self.creating
  }

  pub fn filter(&self) -> FilterMode {
    self.filter
  }

  pub fn search_query(&self) -> &str {
    &self.search_query
  }

  pub fn pomodoro(
    &self
  ) -> &PomodoroState {
    &self.pomodoro
  }

  // --- collection ---

  pub fn set_tasks(
    &mut self,
    tasks: Vec<Task>
  ) {
    debug!(
      count = tasks.len(),
      "store: set tasks"
    );
    self.tasks = tasks;
    self.reindex_selection();
  }

  pub fn add_task(&mut self, task: Task) {
    debug!(id = %task.id, "store: add task");
    self.tasks.insert(0, task);
    self.reindex_selection();
  }

  /// Replaces the task with the same id.
  /// Unknown ids and responses older
  /// than the stored copy are ignored.
  pub fn update_task(
    &mut self,
    task: Task
  ) {
    let Some(slot) = self
      .tasks
      .iter_mut()
      .find(|t| t.id == task.id)
    else {
      trace!(
        id = %task.id,
        "store: update for unknown task \
         ignored"
      );
      return;
    };
    if task.updated_at < slot.updated_at
    {
      debug!(
        id = %task.id,
        incoming = %task.updated_at,
        current = %slot.updated_at,
        "store: stale update discarded"
      );
      return;
    }
    *slot = task;
    self.reindex_selection();
  }

  pub fn remove_task(&mut self, id: &str) {
    let before = self.tasks.len();
    self.tasks.retain(|t| t.id != id);
    debug!(
      id,
      removed = before - self.tasks.len(),
      "store: remove task"
    );
    if self.selected_task_id.as_deref()
      == Some(id)
    {
      self.selected_task_id = None;
    }
    self.reindex_selection();
  }

  // --- selection ---

  pub fn set_selected_task_id(
    &mut self,
    id: Option<&str>
  ) {
    let position = id.and_then(|id| {
      self
        .filtered_tasks()
        .iter()
        .position(|t| t.id == id)
    });

    self.selected_index =
      position.unwrap_or(0);
    self.selected_task_id = match (
      position,
      self.selection_fallback
    ) {
      | (None, SelectionFallback::Clear) => {
        None
      }
      | _ => id.map(str::to_string)
    };
  }

  pub fn set_selected_index(
    &mut self,
    index: usize
  ) {
    let id = self
      .filtered_tasks()
      .get(index)
      .map(|t| t.id.clone());
    if let Some(id) = id {
      self.selected_index = index;
      self.selected_task_id = Some(id);
    }
  }

  /// Clamped to the filtered view. No
  /// wraparound.
  pub fn move_selection(
    &mut self,
    direction: Direction
  ) {
    let (new_index, new_id) = {
      let visible = self.filtered_tasks();
      if visible.is_empty() {
        return;
      }
      let last = visible.len() - 1;
      let current =
        self.selected_index.min(last);
      let new_index = match direction {
        | Direction::Up => {
          current.saturating_sub(1)
        }
        | Direction::Down => {
          (current + 1).min(last)
        }
      };
      if new_index == self.selected_index {
        return;
      }
      (
        new_index,
        visible[new_index].id.clone()
      )
    };

    self.selected_index = new_index;
    self.selected_task_id = Some(new_id);
  }

  /// Looks the selection up in the full
  /// collection, so a task hidden by the
  /// current view is still returned.
  pub fn selected_task(
    &self
  ) -> Option<&Task> {
    let id =
      self.selected_task_id.as_deref()?;
    self.task(id)
  }

  /// Keeps `selected_index` pointing at
  /// the selected id after the view
  /// changed underneath it.
  fn reindex_selection(&mut self) {
    let id = self.selected_task_id.take();
    self.set_selected_task_id(
      id.as_deref()
    );
  }

  // --- modal state ---

  pub fn toggle_command_open(&mut self) {
    self.command_open = !self.command_open;
  }

  pub fn set_command_open(
    &mut self,
    open: bool
  ) {
    self.command_open = open;
  }

  pub fn toggle_focus_mode(
    &mut self,
    task_id: Option<&str>
  ) {
    if self.focus_mode {
      self.focus_mode = false;
      self.focused_task_id = None;
      return;
    }
    self.focus_mode = true;
    self.focused_task_id = task_id
      .map(str::to_string)
      .or_else(|| {
        self.selected_task_id.clone()
      });
  }

  pub fn set_editing(
    &mut self,
    task_id: Option<&str>
  ) {
    self.editing_task_id =
      task_id.map(str::to_string);
  }

  pub fn set_creating(
    &mut self,
    creating: bool
  ) {
    self.creating = creating;
  }

  // --- filter / search ---

  /// Switching the filter always clears
  /// the selection.
  pub fn set_filter(
    &mut self,
    filter: FilterMode
  ) {
    self.filter = filter;
    self.selected_index = 0;
    self.selected_task_id = None;
  }

  pub fn set_search_query(
    &mut self,
    query: impl Into<String>
  ) {
    self.search_query = query.into();
    self.reindex_selection();
  }

  // --- pomodoro ---

  pub fn start_pomodoro(
    &mut self,
    task_id: &str
  ) {
    debug!(
      task_id,
      remaining =
        self.pomodoro.remaining_secs,
      "pomodoro: start"
    );
    self.pomodoro.running = true;
    self.pomodoro.task_id =
      Some(task_id.to_string());
    self.focus_mode = true;
    self.focused_task_id =
      Some(task_id.to_string());
  }

  /// Pause and stop are the same
  /// transition; the remaining time is
  /// kept.
  pub fn stop_pomodoro(&mut self) {
    self.pomodoro.running = false;
  }

  pub fn reset_pomodoro(&mut self) {
    self.pomodoro.remaining_secs =
      self.pomodoro.session_secs;
    self.pomodoro.running = false;
  }

  /// One second of countdown. Reaching
  /// zero stops the timer and restores
  /// the full session length; nothing
  /// else is signalled.
  pub fn tick_pomodoro(&mut self) {
    let p = &mut self.pomodoro;
    if !p.running {
      if p.remaining_secs == 0 {
        p.remaining_secs = p.session_secs;
      }
      return;
    }
    if p.remaining_secs <= 1 {
      debug!(
        task_id = ?p.task_id,
        "pomodoro: session rolled over"
      );
      p.running = false;
      p.remaining_secs = p.session_secs;
    } else {
      p.remaining_secs -= 1;
    }
  }

  // --- derived views ---

  pub fn filtered_tasks(
    &self
  ) -> Vec<&Task> {
    filter_visible_tasks(
      &self.tasks,
      self.filter,
      &self.search_query
    )
  }

  pub fn stats(&self) -> TaskStats {
    let total = self.tasks.len();
    let completed = self
      .tasks
      .iter()
      .filter(|t| t.completed)
      .count();
    let completion_rate = if total == 0 {
      0
    } else {
      ((completed as f64 / total as f64)
        * 100.0)
        .round() as u32
    };
    TaskStats {
      total,
      completed,
      pending: total - completed,
      completion_rate,
      focus_minutes: self
        .tasks
        .iter()
        .map(|t| {
          u64::from(t.focus_time_minutes)
        })
        .sum()
    }
  }

  pub fn tag_counts(
    &self
  ) -> Vec<(String, usize)> {
    build_tag_facets(&self.tasks)
  }
}
