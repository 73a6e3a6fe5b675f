use std::sync::{
  Arc,
  Mutex
};

use async_trait::async_trait;
use chrono::{
  Duration,
  TimeZone,
  Utc
};
use focusboard_core::error::RepoError;
use focusboard_core::events::EventBus;
use focusboard_core::fetch::{
  FetchSettings,
  Fetcher
};
use focusboard_core::repository::{
  BackendKind,
  TaskRepository
};
use focusboard_core::store::TaskStore;
use focusboard_core::{
  Priority,
  Task,
  TaskCreate,
  TaskPatch
};

/// A reachable service with the remote's
/// write rules: PATCH skips a null due
/// date, PUT assigns every field. Each
/// call is recorded by method name.
struct RecordingRemote {
  tasks: Mutex<Vec<Task>>,
  calls: Mutex<Vec<&'static str>>
}

impl RecordingRemote {
  fn new(tasks: Vec<Task>) -> Self {
    Self {
      tasks: Mutex::new(tasks),
      calls: Mutex::new(Vec::new())
    }
  }

  fn calls(&self) -> Vec<&'static str> {
    self.calls.lock().unwrap().clone()
  }

  fn record(&self, call: &'static str) {
    self.calls.lock().unwrap().push(call);
  }

  fn save(
    &self,
    id: &str,
    change: impl FnOnce(&mut Task)
  ) -> Result<Task, RepoError> {
    let mut tasks =
      self.tasks.lock().unwrap();
    let task = tasks
      .iter_mut()
      .find(|t| t.id == id)
      .ok_or_else(|| {
        RepoError::NotFound(id.to_string())
      })?;
    change(task);
    task.updated_at += Duration::seconds(1);
    Ok(task.clone())
  }

  fn unsupported<T>(
    &self
  ) -> Result<T, RepoError> {
    Err(RepoError::Api {
      status:  400,
      message: "not used here".to_string()
    })
  }
}

#[async_trait]
impl TaskRepository for RecordingRemote {
  fn kind(&self) -> BackendKind {
    BackendKind::Remote
  }

  async fn list(
    &self
  ) -> Result<Vec<Task>, RepoError> {
    Ok(self.tasks.lock().unwrap().clone())
  }

  async fn get(
    &self,
    id: &str
  ) -> Result<Task, RepoError> {
    self
      .tasks
      .lock()
      .unwrap()
      .iter()
      .find(|t| t.id == id)
      .cloned()
      .ok_or_else(|| {
        RepoError::NotFound(id.to_string())
      })
  }

  async fn create(
    &self,
    _input: TaskCreate
  ) -> Result<Task, RepoError> {
    self.unsupported()
  }

  async fn patch(
    &self,
    id: &str,
    mut patch: TaskPatch
  ) -> Result<Task, RepoError> {
    self.record("patch");
    if patch.due_date == Some(None) {
      patch.due_date = None;
    }
    self.save(id, |task| patch.apply_to(task))
  }

  async fn replace(
    &self,
    task: Task
  ) -> Result<Task, RepoError> {
    self.record("replace");
    let id = task.id.clone();
    self.save(&id, |stored| {
      let created_at = stored.created_at;
      let updated_at = stored.updated_at;
      *stored = task;
      stored.created_at = created_at;
      stored.updated_at = updated_at;
    })
  }

  async fn toggle_complete(
    &self,
    _id: &str
  ) -> Result<Task, RepoError> {
    self.unsupported()
  }

  async fn delete(
    &self,
    _id: &str
  ) -> Result<(), RepoError> {
    self.unsupported()
  }

  async fn search(
    &self,
    _query: &str
  ) -> Result<Vec<Task>, RepoError> {
    self.unsupported()
  }

  async fn by_tag(
    &self,
    _tag: &str
  ) -> Result<Vec<Task>, RepoError> {
    self.unsupported()
  }

  async fn by_priority(
    &self,
    _priority: Priority
  ) -> Result<Vec<Task>, RepoError> {
    self.unsupported()
  }

  async fn completed(
    &self
  ) -> Result<Vec<Task>, RepoError> {
    self.unsupported()
  }

  async fn pending(
    &self
  ) -> Result<Vec<Task>, RepoError> {
    self.unsupported()
  }
}

async fn connected() -> (
  Fetcher,
  TaskStore,
  Arc<RecordingRemote>
) {
  let at = Utc
    .with_ymd_and_hms(2026, 2, 17, 9, 0, 0)
    .unwrap();
  let mut task =
    Task::new("65f0a", "Renew lease", at);
  task.due_date = Some(at + Duration::days(3));
  task.pomodoro_count = 4;
  task.focus_time_minutes = 100;

  let remote =
    Arc::new(RecordingRemote::new(vec![task]));
  let mut fetcher = Fetcher::with_repository(
    remote.clone(),
    FetchSettings::default(),
    Arc::new(EventBus::new())
  );
  let mut store = TaskStore::default();
  fetcher.load(&mut store).await.unwrap();
  (fetcher, store, remote)
}

#[tokio::test]
async fn clearing_the_due_date_replaces_the_task()
{
  let (mut fetcher, mut store, remote) =
    connected().await;

  let task = fetcher
    .update(&mut store, "65f0a", TaskPatch {
      title: Some("Renew the lease".into()),
      due_date: Some(None),
      ..TaskPatch::default()
    })
    .await
    .unwrap();

  assert_eq!(remote.calls(), vec!["replace"]);
  assert_eq!(task.due_date, None);
  assert_eq!(task.title, "Renew the lease");
  assert_eq!(task.pomodoro_count, 4);
  assert_eq!(task.focus_time_minutes, 100);

  let stored = store.task("65f0a").unwrap();
  assert_eq!(stored.due_date, None);
  assert_eq!(fetcher.backend(), BackendKind::Remote);
}

#[tokio::test]
async fn other_edits_stay_partial_updates() {
  let (mut fetcher, mut store, remote) =
    connected().await;

  let task = fetcher
    .update(&mut store, "65f0a", TaskPatch {
      priority: Some(Priority::High),
      ..TaskPatch::default()
    })
    .await
    .unwrap();

  assert_eq!(remote.calls(), vec!["patch"]);
  assert_eq!(task.priority, Priority::High);
  assert!(task.due_date.is_some());
}

#[tokio::test]
async fn clearing_the_due_date_of_an_unknown_task_is_not_found()
{
  let (mut fetcher, mut store, remote) =
    connected().await;

  let err = fetcher
    .update(&mut store, "nope", TaskPatch {
      due_date: Some(None),
      ..TaskPatch::default()
    })
    .await
    .unwrap_err();

  assert!(err.to_string().contains("nope"));
  assert!(remote.calls().is_empty());
}
