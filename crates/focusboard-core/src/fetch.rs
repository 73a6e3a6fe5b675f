//! The data-fetching layer.
//!
//! Owns the active repository and a small
//! query cache, runs mutations against
//! the repository and feeds results back
//! into the [`TaskStore`]. The backend is
//! chosen once in [`Fetcher::connect`].
//! If the remote goes away later, the
//! fetcher demotes itself to a
//! [`MemoryRepository`] seeded from the
//! store and stays there for the rest of
//! the session.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use focusboard_shared::{
  Priority,
  Task,
  TaskCreate,
  TaskPatch
};
use tokio::time::Instant;
use tracing::{
  debug,
  info,
  instrument,
  warn
};

use crate::config::DEFAULT_API_URL;
use crate::error::{
  FetchError,
  RepoError
};
use crate::events::{
  EventBus,
  ToastKind
};
use crate::memory::MemoryRepository;
use crate::repository::{
  BackendKind,
  RemoteRepository,
  TaskRepository
};
use crate::store::TaskStore;

/// What to do when the remote cannot be
/// reached at startup.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default
)]
pub enum InitialLoadMode {
  /// Continue silently with demo data.
  #[default]
  FallbackToDemo,
  /// Report the failure to the caller.
  SurfaceError
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
  pub base_url:         String,
  pub timeout:          Duration,
  pub initial:          InitialLoadMode,
  /// Extra attempts for the startup
  /// connection check.
  pub retry:            u32,
  pub offline_fallback: bool,
  pub offline:          bool,
  pub stale_after:      Duration
}

impl Default for FetchSettings {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_API_URL
        .to_string(),
      timeout: Duration::from_secs(10),
      initial:
        InitialLoadMode::FallbackToDemo,
      retry: 1,
      offline_fallback: true,
      offline: false,
      stale_after: Duration::from_secs(60)
    }
  }
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Hash
)]
pub enum QueryKey {
  All,
  One(String),
  Search(String),
  Tag(String),
  Priority(Priority),
  Completed,
  Pending
}

#[derive(Debug)]
struct CacheEntry {
  tasks:       Vec<Task>,
  fetched_at:  Instant,
  invalidated: bool
}

#[derive(Debug)]
pub struct QueryCache {
  entries:     HashMap<QueryKey, CacheEntry>,
  stale_after: Duration
}

impl QueryCache {
  pub fn new(
    stale_after: Duration
  ) -> Self {
    Self {
      entries: HashMap::new(),
      stale_after
    }
  }

  pub fn fresh(
    &self,
    key: &QueryKey
  ) -> Option<&[Task]> {
    let entry = self.entries.get(key)?;
    if entry.invalidated
      || entry.fetched_at.elapsed()
        >= self.stale_after
    {
      return None;
    }
    Some(&entry.tasks)
  }

  pub fn insert(
    &mut self,
    key: QueryKey,
    tasks: Vec<Task>
  ) {
    self.entries.insert(
      key,
      CacheEntry {
        tasks,
        fetched_at: Instant::now(),
        invalidated: false
      }
    );
  }

  pub fn invalidate_all(&mut self) {
    for entry in self.entries.values_mut()
    {
      entry.invalidated = true;
    }
  }
}

pub struct Fetcher {
  repo:     Arc<dyn TaskRepository>,
  settings: FetchSettings,
  cache:    QueryCache,
  events:   Arc<EventBus>
}

impl Fetcher {
  /// Picks the backend. The remote is
  /// checked by listing all tasks, with
  /// `settings.retry` extra attempts.
  #[instrument(skip_all, fields(
    url = %settings.base_url,
    offline = settings.offline
  ))]
  pub async fn connect(
    settings: FetchSettings,
    events: Arc<EventBus>
  ) -> Result<Self, FetchError> {
    if settings.offline {
      info!(
        "offline mode; using demo data"
      );
      return Ok(Self::with_repository(
        Arc::new(MemoryRepository::demo()),
        settings,
        events
      ));
    }

    let remote = RemoteRepository::new(
      &settings.base_url,
      settings.timeout
    )?;
    let attempts =
      settings.retry.saturating_add(1);
    let mut last_err = None;
    for attempt in 1..=attempts {
      match remote.list().await {
        | Ok(tasks) => {
          info!(
            count = tasks.len(),
            attempt,
            "connected to task service"
          );
          let mut fetcher =
            Self::with_repository(
              Arc::new(remote),
              settings,
              events
            );
          fetcher
            .cache
            .insert(QueryKey::All, tasks);
          return Ok(fetcher);
        }
        | Err(err) => {
          warn!(
            attempt,
            attempts,
            %err,
            "initial load failed"
          );
          last_err = Some(err);
        }
      }
    }

    let source =
      last_err.unwrap_or_else(|| {
        RepoError::Validation(
          "no attempts made".into()
        )
      });
    match settings.initial {
      | InitialLoadMode::FallbackToDemo => {
        warn!(
          "task service unreachable; \
           showing demo data"
        );
        Ok(Self::with_repository(
          Arc::new(
            MemoryRepository::demo()
          ),
          settings,
          events
        ))
      }
      | InitialLoadMode::SurfaceError => {
        Err(FetchError::Unreachable {
          url: settings.base_url,
          attempts,
          source
        })
      }
    }
  }

  pub fn with_repository(
    repo: Arc<dyn TaskRepository>,
    settings: FetchSettings,
    events: Arc<EventBus>
  ) -> Self {
    let cache =
      QueryCache::new(settings.stale_after);
    Self {
      repo,
      settings,
      cache,
      events
    }
  }

  pub fn backend(&self) -> BackendKind {
    self.repo.kind()
  }

  pub fn events(&self) -> &Arc<EventBus> {
    &self.events
  }

  pub fn cache(&self) -> &QueryCache {
    &self.cache
  }

  pub fn invalidate_all(&mut self) {
    self.cache.invalidate_all();
  }

  /// The list-all query, written into
  /// the store.
  #[instrument(skip_all)]
  pub async fn load(
    &mut self,
    store: &mut TaskStore
  ) -> Result<(), FetchError> {
    let tasks = self
      .query(store, QueryKey::All)
      .await?;
    store.set_tasks(tasks);
    Ok(())
  }

  /// Cache-aware read. A fresh entry is
  /// served without touching the
  /// repository.
  #[instrument(skip(self, store))]
  pub async fn query(
    &mut self,
    store: &TaskStore,
    key: QueryKey
  ) -> Result<Vec<Task>, FetchError> {
    if let Some(tasks) =
      self.cache.fresh(&key)
    {
      debug!(
        count = tasks.len(),
        "cache hit"
      );
      return Ok(tasks.to_vec());
    }

    let tasks = {
      let key = &key;
      self
        .with_fallback(store, |repo| {
          let key = key.clone();
          async move {
            fetch_key(repo.as_ref(), &key)
              .await
          }
        })
        .await?
    };
    self
      .cache
      .insert(key, tasks.clone());
    Ok(tasks)
  }

  #[instrument(skip_all, fields(
    title = %input.title
  ))]
  pub async fn create(
    &mut self,
    store: &mut TaskStore,
    input: TaskCreate
  ) -> Result<Task, FetchError> {
    let task = self
      .with_fallback(store, |repo| {
        let input = input.clone();
        async move {
          repo.create(input).await
        }
      })
      .await?;

    store.add_task(task.clone());
    self.events.success("Task created");
    self.refresh(store).await;
    Ok(task)
  }

  /// Partial update. The remote ignores
  /// a `null` due date on PATCH, so
  /// clearing it there goes through a
  /// full replace of the stored copy.
  #[instrument(skip(self, store, patch))]
  pub async fn update(
    &mut self,
    store: &mut TaskStore,
    id: &str,
    mut patch: TaskPatch
  ) -> Result<Task, FetchError> {
    let remote =
      self.backend() == BackendKind::Remote;
    let task = if remote
      && patch.due_date == Some(None)
    {
      let mut full = store
        .task(id)
        .cloned()
        .ok_or_else(|| {
          RepoError::NotFound(
            id.to_string()
          )
        })?;
      patch.apply_to(&mut full);
      debug!(
        "clearing due date with a full \
         replace"
      );
      self
        .with_fallback(store, |repo| {
          let full = full.clone();
          async move {
            repo.replace(full).await
          }
        })
        .await?
    } else {
      if remote {
        preserve_server_overwritten(
          &mut patch,
          store.task(id)
        );
      }
      self
        .with_fallback(store, |repo| {
          let id = id.to_string();
          let patch = patch.clone();
          async move {
            repo.patch(&id, patch).await
          }
        })
        .await?
    };

    store.update_task(task.clone());
    self.events.success("Task updated");
    self.refresh(store).await;
    Ok(task)
  }

  #[instrument(skip_all, fields(
    id = %task.id
  ))]
  pub async fn replace(
    &mut self,
    store: &mut TaskStore,
    task: Task
  ) -> Result<Task, FetchError> {
    let saved = self
      .with_fallback(store, |repo| {
        let task = task.clone();
        async move {
          repo.replace(task).await
        }
      })
      .await?;

    store.update_task(saved.clone());
    self.events.success("Task saved");
    self.refresh(store).await;
    Ok(saved)
  }

  #[instrument(skip(self, store))]
  pub async fn toggle_complete(
    &mut self,
    store: &mut TaskStore,
    id: &str
  ) -> Result<Task, FetchError> {
    let task = self
      .with_fallback(store, |repo| {
        let id = id.to_string();
        async move {
          repo.toggle_complete(&id).await
        }
      })
      .await?;

    store.update_task(task.clone());
    if task.completed {
      self.events.success("Task completed");
    } else {
      self.events.success("Task reopened");
    }
    self.refresh(store).await;
    Ok(task)
  }

  /// Flips one sub-step through a patch
  /// of the whole step list.
  #[instrument(skip(self, store))]
  pub async fn toggle_step(
    &mut self,
    store: &mut TaskStore,
    id: &str,
    index: usize
  ) -> Result<Task, FetchError> {
    let current =
      store.task(id).ok_or_else(|| {
        RepoError::NotFound(id.to_string())
      })?;
    let mut steps = current.steps.clone();
    let Some(step) = steps.get_mut(index)
    else {
      return Err(
        RepoError::Validation(format!(
          "task {id} has {} step(s); no \
           step at index {index}",
          current.steps.len()
        ))
        .into()
      );
    };
    step.is_completed = !step.is_completed;
    let done = step.is_completed;

    let patch = TaskPatch {
      steps: Some(steps),
      ..TaskPatch::default()
    };
    let task =
      self.update(store, id, patch).await?;
    debug!(index, done, "step toggled");
    Ok(task)
  }

  #[instrument(skip(self, store))]
  pub async fn delete(
    &mut self,
    store: &mut TaskStore,
    id: &str
  ) -> Result<(), FetchError> {
    self
      .with_fallback(store, |repo| {
        let id = id.to_string();
        async move {
          repo.delete(&id).await
        }
      })
      .await?;

    store.remove_task(id);
    self.events.success("Task deleted");
    self.refresh(store).await;
    Ok(())
  }

  /// Credits one finished Pomodoro to
  /// `id`.
  #[instrument(skip(self, store))]
  pub async fn record_pomodoro(
    &mut self,
    store: &mut TaskStore,
    id: &str,
    minutes: u32
  ) -> Result<Task, FetchError> {
    let current =
      store.task(id).ok_or_else(|| {
        RepoError::NotFound(id.to_string())
      })?;
    let patch = TaskPatch {
      pomodoro_count: Some(
        current
          .pomodoro_count
          .saturating_add(1)
      ),
      focus_time_minutes: Some(
        current
          .focus_time_minutes
          .saturating_add(minutes)
      ),
      ..TaskPatch::default()
    };

    let task = self
      .with_fallback(store, |repo| {
        let id = id.to_string();
        let patch = patch.clone();
        async move {
          repo.patch(&id, patch).await
        }
      })
      .await?;

    store.update_task(task.clone());
    self.events.publish(
      format!(
        "{} pomodoro(s) on \"{}\"",
        task.pomodoro_count, task.title
      ),
      ToastKind::Streak
    );
    self.refresh(store).await;
    Ok(task)
  }

  /// Runs `op` against the active
  /// repository. A connectivity failure
  /// on the remote demotes to local data
  /// and runs `op` once more there.
  async fn with_fallback<T, F, Fut>(
    &mut self,
    store: &TaskStore,
    op: F
  ) -> Result<T, RepoError>
  where
    F: Fn(Arc<dyn TaskRepository>) -> Fut,
    Fut: Future<Output = Result<T, RepoError>>
  {
    match op(Arc::clone(&self.repo)).await {
      | Err(err) if self.can_demote(&err) => {
        self.demote(store, &err);
        op(Arc::clone(&self.repo)).await
      }
      | result => result
    }
  }

  fn can_demote(
    &self,
    err: &RepoError
  ) -> bool {
    self.settings.offline_fallback
      && self.repo.kind()
        == BackendKind::Remote
      && err.is_connectivity()
  }

  fn demote(
    &mut self,
    store: &TaskStore,
    cause: &RepoError
  ) {
    warn!(
      %cause,
      seeded = store.tasks().len(),
      "task service unavailable; \
       continuing with local data"
    );
    self.repo = Arc::new(
      MemoryRepository::from_tasks(
        store.tasks().to_vec()
      )
    );
    self.cache.invalidate_all();
  }

  /// Invalidate, then re-read the full
  /// list into the store. Failures are
  /// logged only: the mutation itself
  /// already succeeded.
  async fn refresh(
    &mut self,
    store: &mut TaskStore
  ) {
    self.cache.invalidate_all();
    match fetch_key(
      self.repo.as_ref(),
      &QueryKey::All
    )
    .await
    {
      | Ok(tasks) => {
        self.cache.insert(
          QueryKey::All,
          tasks.clone()
        );
        store.set_tasks(tasks);
      }
      | Err(err) => {
        warn!(
          %err,
          "refresh after mutation failed"
        )
      }
    }
  }
}

async fn fetch_key(
  repo: &dyn TaskRepository,
  key: &QueryKey
) -> Result<Vec<Task>, RepoError> {
  match key {
    | QueryKey::All => repo.list().await,
    | QueryKey::One(id) => {
      repo
        .get(id)
        .await
        .map(|task| vec![task])
    }
    | QueryKey::Search(q) => {
      repo.search(q).await
    }
    | QueryKey::Tag(tag) => {
      repo.by_tag(tag).await
    }
    | QueryKey::Priority(p) => {
      repo.by_priority(*p).await
    }
    | QueryKey::Completed => {
      repo.completed().await
    }
    | QueryKey::Pending => {
      repo.pending().await
    }
  }
}

/// The remote resets these fields on
/// every PATCH unless they are sent.
fn preserve_server_overwritten(
  patch: &mut TaskPatch,
  current: Option<&Task>
) {
  let Some(current) = current else {
    return;
  };
  patch
    .completed
    .get_or_insert(current.completed);
  patch
    .focus_time_minutes
    .get_or_insert(
      current.focus_time_minutes
    );
  patch
    .pomodoro_count
    .get_or_insert(current.pomodoro_count);
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;
  use std::time::Duration;

  use chrono::Utc;
  use focusboard_shared::{
    Task,
    TaskCreate,
    TaskPatch
  };
  use pretty_assertions::assert_eq;

  use super::{
    FetchSettings,
    Fetcher,
    QueryCache,
    QueryKey,
    preserve_server_overwritten
  };
  use crate::error::{
    FetchError,
    RepoError
  };
  use crate::events::EventBus;
  use crate::memory::MemoryRepository;
  use crate::repository::BackendKind;
  use crate::store::TaskStore;

  fn demo_fetcher() -> Fetcher {
    Fetcher::with_repository(
      Arc::new(MemoryRepository::demo()),
      FetchSettings::default(),
      Arc::new(EventBus::new())
    )
  }

  #[tokio::test]
  async fn offline_connect_uses_demo_data()
  {
    let settings = FetchSettings {
      offline: true,
      ..FetchSettings::default()
    };
    let mut fetcher = Fetcher::connect(
      settings,
      Arc::new(EventBus::new())
    )
    .await
    .unwrap();
    let mut store = TaskStore::default();
    fetcher.load(&mut store).await.unwrap();

    assert_eq!(
      fetcher.backend(),
      BackendKind::Memory
    );
    assert_eq!(store.tasks().len(), 5);
  }

  #[tokio::test(start_paused = true)]
  async fn cache_entries_expire_and_invalidate()
  {
    let mut cache = QueryCache::new(
      Duration::from_secs(60)
    );
    cache.insert(QueryKey::Completed, vec![]);
    assert!(
      cache
        .fresh(&QueryKey::Completed)
        .is_some()
    );
    assert!(
      cache.fresh(&QueryKey::Pending).is_none()
    );

    tokio::time::advance(
      Duration::from_secs(61)
    )
    .await;
    assert!(
      cache
        .fresh(&QueryKey::Completed)
        .is_none()
    );

    cache.insert(QueryKey::Completed, vec![]);
    cache.invalidate_all();
    assert!(
      cache
        .fresh(&QueryKey::Completed)
        .is_none()
    );
  }

  #[tokio::test]
  async fn mutations_update_store_and_publish_toasts()
  {
    let mut fetcher = demo_fetcher();
    let mut rx = fetcher.events().subscribe();
    let mut store = TaskStore::default();
    fetcher.load(&mut store).await.unwrap();

    let created = fetcher
      .create(&mut store, TaskCreate {
        title: "Call the bank".to_string(),
        ..TaskCreate::default()
      })
      .await
      .unwrap();
    assert_eq!(store.tasks()[0].id, created.id);
    assert_eq!(
      rx.recv().await.unwrap().message,
      "Task created"
    );

    let toggled = fetcher
      .toggle_complete(&mut store, &created.id)
      .await
      .unwrap();
    assert!(toggled.completed);
    assert_eq!(
      rx.recv().await.unwrap().message,
      "Task completed"
    );

    fetcher
      .delete(&mut store, &created.id)
      .await
      .unwrap();
    assert!(store.task(&created.id).is_none());
    assert_eq!(
      rx.recv().await.unwrap().message,
      "Task deleted"
    );
  }

  #[tokio::test]
  async fn toggle_step_flips_one_step() {
    let mut fetcher = demo_fetcher();
    let mut store = TaskStore::default();
    fetcher.load(&mut store).await.unwrap();

    let task = fetcher
      .toggle_step(&mut store, "demo-1", 1)
      .await
      .unwrap();
    assert!(task.steps[0].is_completed);
    assert!(task.steps[1].is_completed);
    assert!(!task.steps[2].is_completed);
    assert!(
      store.task("demo-1").unwrap().steps[1]
        .is_completed
    );

    let err = fetcher
      .toggle_step(&mut store, "demo-1", 9)
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      FetchError::Repo(RepoError::Validation(_))
    ));
  }

  #[tokio::test]
  async fn record_pomodoro_accumulates() {
    let mut fetcher = demo_fetcher();
    let mut store = TaskStore::default();
    fetcher.load(&mut store).await.unwrap();

    let task = fetcher
      .record_pomodoro(&mut store, "demo-1", 25)
      .await
      .unwrap();
    assert_eq!(task.pomodoro_count, 3);
    assert_eq!(task.focus_time_minutes, 75);
  }

  #[tokio::test]
  async fn local_clear_due_uses_a_patch() {
    let mut fetcher = demo_fetcher();
    let mut store = TaskStore::default();
    fetcher.load(&mut store).await.unwrap();
    assert!(
      store
        .task("demo-1")
        .unwrap()
        .due_date
        .is_some()
    );

    let task = fetcher
      .update(&mut store, "demo-1", TaskPatch {
        due_date: Some(None),
        ..TaskPatch::default()
      })
      .await
      .unwrap();
    assert_eq!(task.due_date, None);
    assert_eq!(
      store.task("demo-1").unwrap().due_date,
      None
    );
  }

  #[tokio::test]
  async fn unknown_ids_surface_not_found() {
    let mut fetcher = demo_fetcher();
    let mut store = TaskStore::default();
    fetcher.load(&mut store).await.unwrap();

    let err = fetcher
      .update(
        &mut store,
        "missing",
        TaskPatch::default()
      )
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      FetchError::Repo(RepoError::NotFound(_))
    ));
  }

  #[tokio::test]
  async fn queries_are_served_from_cache_until_invalidated()
  {
    let mut fetcher = demo_fetcher();
    let mut store = TaskStore::default();
    fetcher.load(&mut store).await.unwrap();

    let first = fetcher
      .query(&store, QueryKey::Tag("ux".into()))
      .await
      .unwrap();
    assert_eq!(first.len(), 2);
    assert!(
      fetcher
        .cache()
        .fresh(&QueryKey::Tag("ux".into()))
        .is_some()
    );

    fetcher.invalidate_all();
    assert!(
      fetcher
        .cache()
        .fresh(&QueryKey::Tag("ux".into()))
        .is_none()
    );
  }

  #[test]
  fn patch_keeps_fields_the_server_would_reset()
  {
    let mut current =
      Task::new("t", "x", Utc::now());
    current.completed = true;
    current.focus_time_minutes = 50;
    current.pomodoro_count = 2;

    let mut patch = TaskPatch {
      title: Some("y".into()),
      pomodoro_count: Some(3),
      ..TaskPatch::default()
    };
    preserve_server_overwritten(
      &mut patch,
      Some(&current)
    );

    assert_eq!(patch.completed, Some(true));
    assert_eq!(
      patch.focus_time_minutes,
      Some(50)
    );
    assert_eq!(patch.pomodoro_count, Some(3));
  }
}
