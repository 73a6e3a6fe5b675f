//! In-process task storage: the demo data
//! set and the local stand-in used when
//! the remote service goes away
//! mid-session.

use async_trait::async_trait;
use chrono::{
  DateTime,
  Duration,
  Utc
};
use focusboard_shared::{
  Priority,
  SubItem,
  Task,
  TaskCreate,
  TaskPatch
};
use tokio::sync::Mutex;
use tracing::{
  debug,
  instrument
};

use crate::error::RepoError;
use crate::filter::{
  FilterMode,
  matches_search
};
use crate::repository::{
  BackendKind,
  TaskRepository,
  validate_create,
  validate_patch
};

#[derive(Debug, Default)]
pub struct MemoryRepository {
  tasks: Mutex<Vec<Task>>
}

impl MemoryRepository {
  pub fn from_tasks(
    tasks: Vec<Task>
  ) -> Self {
    Self {
      tasks: Mutex::new(tasks)
    }
  }

  pub fn demo() -> Self {
    Self::from_tasks(demo_tasks(Utc::now()))
  }

  pub async fn snapshot(&self) -> Vec<Task> {
    self.tasks.lock().await.clone()
  }

  async fn select(
    &self,
    keep: impl Fn(&Task) -> bool
  ) -> Vec<Task> {
    self
      .tasks
      .lock()
      .await
      .iter()
      .filter(|t| keep(t))
      .cloned()
      .collect()
  }

  async fn modify(
    &self,
    id: &str,
    change: impl FnOnce(&mut Task)
  ) -> Result<Task, RepoError> {
    let mut tasks = self.tasks.lock().await;
    let task = tasks
      .iter_mut()
      .find(|t| t.id == id)
      .ok_or_else(|| {
        RepoError::NotFound(id.to_string())
      })?;
    change(task);
    task.updated_at =
      next_stamp(task.updated_at, Utc::now());
    Ok(task.clone())
  }
}

/// Strictly after `previous`, so every
/// local write is observable.
fn next_stamp(
  previous: DateTime<Utc>,
  now: DateTime<Utc>
) -> DateTime<Utc> {
  if now > previous {
    now
  } else {
    previous + Duration::milliseconds(1)
  }
}

fn next_id(
  tasks: &[Task],
  now: DateTime<Utc>
) -> String {
  let mut candidate = now.timestamp_millis();
  while tasks
    .iter()
    .any(|t| t.id == candidate.to_string())
  {
    candidate += 1;
  }
  candidate.to_string()
}

#[async_trait]
impl TaskRepository for MemoryRepository {
  fn kind(&self) -> BackendKind {
    BackendKind::Memory
  }

  async fn list(
    &self
  ) -> Result<Vec<Task>, RepoError> {
    Ok(self.snapshot().await)
  }

  async fn get(
    &self,
    id: &str
  ) -> Result<Task, RepoError> {
    self
      .tasks
      .lock()
      .await
      .iter()
      .find(|t| t.id == id)
      .cloned()
      .ok_or_else(|| {
        RepoError::NotFound(id.to_string())
      })
  }

  #[instrument(skip_all, fields(
    title = %input.title
  ))]
  async fn create(
    &self,
    input: TaskCreate
  ) -> Result<Task, RepoError> {
    validate_create(&input)?;
    let now = Utc::now();
    let mut tasks = self.tasks.lock().await;

    let mut task = Task::new(
      next_id(&tasks, now),
      input.title.trim(),
      now
    );
    task.description =
      input.description.unwrap_or_default();
    task.tags = input.tags.unwrap_or_default();
    task.steps =
      input.steps.unwrap_or_default();
    task.priority =
      input.priority.unwrap_or_default();
    task.due_date = input.due_date;

    debug!(
      id = %task.id,
      "memory: created task"
    );
    tasks.insert(0, task.clone());
    Ok(task)
  }

  #[instrument(skip(self, patch))]
  async fn patch(
    &self,
    id: &str,
    patch: TaskPatch
  ) -> Result<Task, RepoError> {
    validate_patch(&patch)?;
    self
      .modify(id, |task| patch.apply_to(task))
      .await
  }

  async fn replace(
    &self,
    task: Task
  ) -> Result<Task, RepoError> {
    if task.title.trim().is_empty() {
      return Err(RepoError::Validation(
        "title cannot be empty".to_string()
      ));
    }
    let id = task.id.clone();
    self
      .modify(&id, move |slot| {
        let created_at = slot.created_at;
        let updated_at = slot.updated_at;
        *slot = task;
        slot.created_at = created_at;
        slot.updated_at = updated_at;
      })
      .await
  }

  #[instrument(skip(self))]
  async fn toggle_complete(
    &self,
    id: &str
  ) -> Result<Task, RepoError> {
    self
      .modify(id, |task| {
        task.completed = !task.completed
      })
      .await
  }

  async fn delete(
    &self,
    id: &str
  ) -> Result<(), RepoError> {
    let mut tasks = self.tasks.lock().await;
    let before = tasks.len();
    tasks.retain(|t| t.id != id);
    if tasks.len() == before {
      return Err(RepoError::NotFound(
        id.to_string()
      ));
    }
    Ok(())
  }

  async fn search(
    &self,
    query: &str
  ) -> Result<Vec<Task>, RepoError> {
    Ok(
      self
        .select(|t| matches_search(t, query))
        .await
    )
  }

  async fn by_tag(
    &self,
    tag: &str
  ) -> Result<Vec<Task>, RepoError> {
    Ok(
      self
        .select(|t| {
          t.tags.iter().any(|x| x == tag)
        })
        .await
    )
  }

  async fn by_priority(
    &self,
    priority: Priority
  ) -> Result<Vec<Task>, RepoError> {
    Ok(
      self
        .select(|t| t.priority == priority)
        .await
    )
  }

  async fn completed(
    &self
  ) -> Result<Vec<Task>, RepoError> {
    Ok(
      self
        .select(|t| {
          FilterMode::Completed.matches(t)
        })
        .await
    )
  }

  async fn pending(
    &self
  ) -> Result<Vec<Task>, RepoError> {
    Ok(
      self
        .select(|t| {
          FilterMode::Pending.matches(t)
        })
        .await
    )
  }
}

/// The fixed data set shown when the
/// service cannot be reached at startup.
pub fn demo_tasks(
  now: DateTime<Utc>
) -> Vec<Task> {
  let base = now - Duration::days(3);
  let step = |name: &str, done: bool| {
    SubItem {
      step_name:    name.to_string(),
      is_completed: done
    }
  };
  let tag = |names: &[&str]| {
    names
      .iter()
      .map(|s| s.to_string())
      .collect::<Vec<_>>()
  };

  let mut tasks = Vec::new();

  let mut t = Task::new(
    "demo-1",
    "Design the onboarding flow",
    base
  );
  t.description = "Sketch the first-run \
                   experience and the empty \
                   states."
    .to_string();
  t.tags = tag(&["design", "ux"]);
  t.steps = vec![
    step("Collect reference screens", true),
    step("Wireframe three variants", false),
    step("Review with the team", false),
  ];
  t.priority = Priority::High;
  t.due_date = Some(now + Duration::days(2));
  t.focus_time_minutes = 50;
  t.pomodoro_count = 2;
  tasks.push(t);

  let mut t = Task::new(
    "demo-2",
    "Fix flaky login test",
    base + Duration::hours(2)
  );
  t.description = "Times out on CI roughly \
                   one run in ten."
    .to_string();
  t.tags = tag(&["bug", "ci"]);
  t.priority = Priority::Urgent;
  t.due_date = Some(now + Duration::hours(6));
  tasks.push(t);

  let mut t = Task::new(
    "demo-3",
    "Write weekly update",
    base + Duration::hours(5)
  );
  t.tags = tag(&["writing"]);
  t.steps = vec![
    step("Gather metrics", true),
    step("Draft", true),
  ];
  t.completed = true;
  t.priority = Priority::Medium;
  t.focus_time_minutes = 25;
  t.pomodoro_count = 1;
  tasks.push(t);

  let mut t = Task::new(
    "demo-4",
    "Read the caching paper",
    base + Duration::days(1)
  );
  t.description =
    "Section 4 on eviction policies."
      .to_string();
  t.tags = tag(&["learning"]);
  t.priority = Priority::Low;
  tasks.push(t);

  let mut t = Task::new(
    "demo-5",
    "Plan sprint backlog",
    base + Duration::days(2)
  );
  t.tags = tag(&["planning", "ux"]);
  t.steps = vec![
    step("Triage inbox", false),
    step("Estimate top ten", false),
  ];
  t.priority = Priority::Medium;
  t.due_date = Some(now + Duration::days(5));
  tasks.push(t);

  tasks
}
