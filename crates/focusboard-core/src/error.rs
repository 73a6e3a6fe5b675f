//! Error types for the repository and
//! data-fetching layers.

use thiserror::Error;

/// Errors a
/// [`TaskRepository`](crate::repository::TaskRepository)
/// can return.
#[derive(Debug, Error)]
pub enum RepoError {
  /// HTTP transport error.
  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),

  /// The task API answered with a
  /// non-success status.
  #[error("API error ({status}): {message}")]
  Api {
    /// HTTP status code.
    status:  u16,
    /// Response body, possibly empty.
    message: String
  },

  /// No task with this id exists.
  #[error("task not found: {0}")]
  NotFound(String),

  /// The request was rejected before
  /// reaching storage.
  #[error("invalid request: {0}")]
  Validation(String),

  /// The response body could not be
  /// decoded.
  #[error("decode error: {0}")]
  Decode(String)
}

impl RepoError {
  /// True when the remote could not be
  /// reached or failed on its side. Only
  /// these errors trigger a switch to
  /// local data.
  pub fn is_connectivity(&self) -> bool {
    match self {
      | RepoError::Http(err) => {
        !(err.is_decode() || err.is_builder())
      }
      | RepoError::Api { status, .. } => {
        *status >= 500
      }
      | _ => false
    }
  }
}

#[derive(Debug, Error)]
pub enum FetchError {
  #[error(
    "cannot reach the task service at \
     {url} after {attempts} attempt(s): \
     {source}"
  )]
  Unreachable {
    url:      String,
    attempts: u32,
    #[source]
    source:   RepoError
  },

  #[error(transparent)]
  Repo(#[from] RepoError)
}

#[cfg(test)]
mod tests {
  use super::{
    FetchError,
    RepoError
  };

  #[test]
  fn only_server_side_statuses_count_as_connectivity()
  {
    let api = |status| {
      RepoError::Api {
        status,
        message: String::new()
      }
    };
    assert!(api(500).is_connectivity());
    assert!(api(503).is_connectivity());
    assert!(!api(400).is_connectivity());
    assert!(!api(404).is_connectivity());
    assert!(
      !RepoError::NotFound("t1".into())
        .is_connectivity()
    );
    assert!(
      !RepoError::Decode("eof".into())
        .is_connectivity()
    );
  }

  #[test]
  fn unreachable_message_names_url_and_attempts()
  {
    let err = FetchError::Unreachable {
      url:      "http://localhost:8080/task"
        .into(),
      attempts: 2,
      source:   RepoError::Api {
        status:  502,
        message: "bad gateway".into()
      }
    };
    let text = err.to_string();
    assert!(
      text.contains(
        "http://localhost:8080/task"
      )
    );
    assert!(text.contains("2 attempt(s)"));
    assert!(text.contains("502"));
  }
}
