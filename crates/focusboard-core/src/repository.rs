//! The storage seam between the fetcher
//! and wherever tasks live.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use focusboard_shared::{
  Priority,
  Task,
  TaskCreate,
  TaskPatch
};
use tracing::instrument;

use crate::api::ApiClient;
use crate::error::RepoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
  Remote,
  Memory
}

impl fmt::Display for BackendKind {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | BackendKind::Remote => {
        f.write_str("remote")
      }
      | BackendKind::Memory => {
        f.write_str("demo")
      }
    }
  }
}

/// Task persistence. Implementations
/// return the stored task after every
/// write so callers never have to guess
/// server-side fields.
#[async_trait]
pub trait TaskRepository: Send + Sync {
  fn kind(&self) -> BackendKind;

  async fn list(
    &self
  ) -> Result<Vec<Task>, RepoError>;
  async fn get(
    &self,
    id: &str
  ) -> Result<Task, RepoError>;
  async fn create(
    &self,
    input: TaskCreate
  ) -> Result<Task, RepoError>;
  async fn patch(
    &self,
    id: &str,
    patch: TaskPatch
  ) -> Result<Task, RepoError>;
  async fn replace(
    &self,
    task: Task
  ) -> Result<Task, RepoError>;
  async fn toggle_complete(
    &self,
    id: &str
  ) -> Result<Task, RepoError>;
  async fn delete(
    &self,
    id: &str
  ) -> Result<(), RepoError>;

  async fn search(
    &self,
    query: &str
  ) -> Result<Vec<Task>, RepoError>;
  async fn by_tag(
    &self,
    tag: &str
  ) -> Result<Vec<Task>, RepoError>;
  async fn by_priority(
    &self,
    priority: Priority
  ) -> Result<Vec<Task>, RepoError>;
  async fn completed(
    &self
  ) -> Result<Vec<Task>, RepoError>;
  async fn pending(
    &self
  ) -> Result<Vec<Task>, RepoError>;
}

pub(crate) fn validate_create(
  input: &TaskCreate
) -> Result<(), RepoError> {
  if input.title.trim().is_empty() {
    return Err(RepoError::Validation(
      "title cannot be empty".to_string()
    ));
  }
  Ok(())
}

pub(crate) fn validate_patch(
  patch: &TaskPatch
) -> Result<(), RepoError> {
  if patch
    .title
    .as_deref()
    .is_some_and(|t| t.trim().is_empty())
  {
    return Err(RepoError::Validation(
      "title cannot be empty".to_string()
    ));
  }
  Ok(())
}

/// The HTTP task service.
#[derive(Debug, Clone)]
pub struct RemoteRepository {
  client: ApiClient
}

impl RemoteRepository {
  pub fn new(
    base_url: impl Into<String>,
    timeout: Duration
  ) -> Result<Self, RepoError> {
    Ok(Self {
      client: ApiClient::new(
        base_url, timeout
      )?
    })
  }

  pub fn base_url(&self) -> &str {
    self.client.base_url()
  }
}

#[async_trait]
impl TaskRepository for RemoteRepository {
  fn kind(&self) -> BackendKind {
    BackendKind::Remote
  }

  async fn list(
    &self
  ) -> Result<Vec<Task>, RepoError> {
    self.client.list().await
  }

  async fn get(
    &self,
    id: &str
  ) -> Result<Task, RepoError> {
    self.client.get(id).await
  }

  #[instrument(skip_all, fields(
    title = %input.title
  ))]
  async fn create(
    &self,
    input: TaskCreate
  ) -> Result<Task, RepoError> {
    validate_create(&input)?;
    self.client.create(&input).await
  }

  #[instrument(skip(self, patch))]
  async fn patch(
    &self,
    id: &str,
    patch: TaskPatch
  ) -> Result<Task, RepoError> {
    validate_patch(&patch)?;
    self.client.patch(id, &patch).await
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
    self.client.replace(&task).await
  }

  async fn toggle_complete(
    &self,
    id: &str
  ) -> Result<Task, RepoError> {
    self.client.toggle_complete(id).await
  }

  async fn delete(
    &self,
    id: &str
  ) -> Result<(), RepoError> {
    self.client.delete(id).await
  }

  async fn search(
    &self,
    query: &str
  ) -> Result<Vec<Task>, RepoError> {
    self.client.search(query).await
  }

  async fn by_tag(
    &self,
    tag: &str
  ) -> Result<Vec<Task>, RepoError> {
    self.client.by_tag(tag).await
  }

  async fn by_priority(
    &self,
    priority: Priority
  ) -> Result<Vec<Task>, RepoError> {
    self.client.by_priority(priority).await
  }

  async fn completed(
    &self
  ) -> Result<Vec<Task>, RepoError> {
    self.client.completed().await
  }

  async fn pending(
    &self
  ) -> Result<Vec<Task>, RepoError> {
    self.client.pending().await
  }
}

#[cfg(test)]
mod tests {
  use focusboard_shared::{
    TaskCreate,
    TaskPatch
  };

  use super::{
    validate_create,
    validate_patch
  };
  use crate::error::RepoError;

  #[test]
  fn blank_titles_are_rejected() {
    let create = TaskCreate {
      title: "   ".to_string(),
      ..TaskCreate::default()
    };
    assert!(matches!(
      validate_create(&create),
      Err(RepoError::Validation(_))
    ));

    let patch = TaskPatch {
      title: Some(String::new()),
      ..TaskPatch::default()
    };
    assert!(validate_patch(&patch).is_err());
    assert!(
      validate_patch(&TaskPatch::default())
        .is_ok()
    );
  }
}
