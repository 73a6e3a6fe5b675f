//! HTTP client for the remote task
//! service.
//!
//! One method per endpoint. Status mapping
//! lives in [`check_response`] so the
//! endpoint methods stay focused on
//! building requests.

use std::time::Duration;

use focusboard_shared::{
  Priority,
  Task,
  TaskCreate,
  TaskPatch
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{
  debug,
  instrument
};

use crate::error::RepoError;

#[derive(Debug, Clone)]
pub struct ApiClient {
  http:     reqwest::Client,
  base_url: String
}

impl ApiClient {
  /// `base_url` is the task collection,
  /// e.g. `http://localhost:8080/task`.
  pub fn new(
    base_url: impl Into<String>,
    timeout: Duration
  ) -> Result<Self, RepoError> {
    let http = reqwest::Client::builder()
      .user_agent(concat!(
        "focusboard/",
        env!("CARGO_PKG_VERSION")
      ))
      .timeout(timeout)
      .build()?;
    Ok(Self {
      http,
      base_url: base_url
        .into()
        .trim_end_matches('/')
        .to_string()
    })
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  fn url(
    &self,
    segments: &[&str]
  ) -> String {
    let mut url = self.base_url.clone();
    for segment in segments {
      url.push('/');
      url.push_str(&urlencoding::encode(
        segment
      ));
    }
    url
  }

  #[instrument(skip(self))]
  pub async fn list(
    &self
  ) -> Result<Vec<Task>, RepoError> {
    self
      .get_json(self.base_url.clone(), None)
      .await
  }

  #[instrument(skip(self))]
  pub async fn get(
    &self,
    id: &str
  ) -> Result<Task, RepoError> {
    self.get_json(self.url(&[id]), Some(id)).await
  }

  #[instrument(skip(self, input), fields(
    title = %input.title
  ))]
  pub async fn create(
    &self,
    input: &TaskCreate
  ) -> Result<Task, RepoError> {
    let resp = self
      .http
      .post(&self.base_url)
      .json(input)
      .send()
      .await?;
    decode(check_response(resp, None).await?)
      .await
  }

  #[instrument(skip(self, task), fields(
    id = %task.id
  ))]
  pub async fn replace(
    &self,
    task: &Task
  ) -> Result<Task, RepoError> {
    self
      .send_json(
        reqwest::Method::PUT,
        self.url(&[&task.id]),
        &task.id,
        task
      )
      .await
  }

  #[instrument(skip(self, patch))]
  pub async fn patch(
    &self,
    id: &str,
    patch: &TaskPatch
  ) -> Result<Task, RepoError> {
    self
      .send_json(
        reqwest::Method::PATCH,
        self.url(&[id]),
        id,
        patch
      )
      .await
  }

  #[instrument(skip(self))]
  pub async fn toggle_complete(
    &self,
    id: &str
  ) -> Result<Task, RepoError> {
    let resp = self
      .http
      .patch(self.url(&[id, "complete"]))
      .send()
      .await?;
    decode(
      check_response(resp, Some(id)).await?
    )
    .await
  }

  #[instrument(skip(self))]
  pub async fn delete(
    &self,
    id: &str
  ) -> Result<(), RepoError> {
    let resp = self
      .http
      .delete(self.url(&[id]))
      .send()
      .await?;
    check_response(resp, Some(id)).await?;
    Ok(())
  }

  #[instrument(skip(self))]
  pub async fn search(
    &self,
    query: &str
  ) -> Result<Vec<Task>, RepoError> {
    let url = format!(
      "{}/search?q={}",
      self.base_url,
      urlencoding::encode(query)
    );
    self.get_json(url, None).await
  }

  #[instrument(skip(self))]
  pub async fn by_tag(
    &self,
    tag: &str
  ) -> Result<Vec<Task>, RepoError> {
    self
      .get_json(self.url(&["tag", tag]), None)
      .await
  }

  #[instrument(skip(self))]
  pub async fn by_priority(
    &self,
    priority: Priority
  ) -> Result<Vec<Task>, RepoError> {
    self
      .get_json(
        self.url(&[
          "priority",
          priority.as_str()
        ]),
        None
      )
      .await
  }

  #[instrument(skip(self))]
  pub async fn completed(
    &self
  ) -> Result<Vec<Task>, RepoError> {
    self
      .get_json(self.url(&["completed"]), None)
      .await
  }

  #[instrument(skip(self))]
  pub async fn pending(
    &self
  ) -> Result<Vec<Task>, RepoError> {
    self
      .get_json(self.url(&["pending"]), None)
      .await
  }

  async fn get_json<T: DeserializeOwned>(
    &self,
    url: String,
    id: Option<&str>
  ) -> Result<T, RepoError> {
    debug!(%url, "GET");
    let resp =
      self.http.get(&url).send().await?;
    decode(check_response(resp, id).await?)
      .await
  }

  async fn send_json<
    B: Serialize + ?Sized
  >(
    &self,
    method: reqwest::Method,
    url: String,
    id: &str,
    body: &B
  ) -> Result<Task, RepoError> {
    debug!(%method, %url, "send");
    let resp = self
      .http
      .request(method, &url)
      .json(body)
      .send()
      .await?;
    decode(
      check_response(resp, Some(id)).await?
    )
    .await
  }
}

/// 404 becomes [`RepoError::NotFound`]
/// (carrying `id` when known), any other
/// non-success status becomes
/// [`RepoError::Api`] with the body as
/// message.
pub async fn check_response(
  resp: reqwest::Response,
  id: Option<&str>
) -> Result<reqwest::Response, RepoError> {
  let status = resp.status();
  if status == reqwest::StatusCode::NOT_FOUND
  {
    let what = match id {
      | Some(id) => id.to_string(),
      | None => resp.url().path().to_string()
    };
    return Err(RepoError::NotFound(what));
  }
  if !status.is_success() {
    return Err(RepoError::Api {
      status:  status.as_u16(),
      message: resp
        .text()
        .await
        .unwrap_or_default()
    });
  }
  Ok(resp)
}

async fn decode<T: DeserializeOwned>(
  resp: reqwest::Response
) -> Result<T, RepoError> {
  let bytes = resp.bytes().await?;
  serde_json::from_slice(&bytes).map_err(
    |err| RepoError::Decode(err.to_string())
  )
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;

  fn mock_response(
    status: u16,
    body: &'static str
  ) -> reqwest::Response {
    reqwest::Response::from(
      ::http::Response::builder()
        .status(status)
        .body(body)
        .unwrap()
    )
  }

  #[tokio::test]
  async fn not_found_carries_the_id() {
    let err = check_response(
      mock_response(404, ""),
      Some("t9")
    )
    .await
    .unwrap_err();
    assert!(matches!(
      err,
      RepoError::NotFound(ref id) if id == "t9"
    ));
  }

  #[tokio::test]
  async fn server_error_keeps_status_and_body()
  {
    let err = check_response(
      mock_response(503, "maintenance"),
      None
    )
    .await
    .unwrap_err();
    assert!(matches!(
      err,
      RepoError::Api {
        status: 503,
        ref message
      } if message == "maintenance"
    ));
    assert!(err.is_connectivity());
  }

  #[tokio::test]
  async fn bad_request_is_not_connectivity() {
    let err = check_response(
      mock_response(400, "title required"),
      None
    )
    .await
    .unwrap_err();
    assert!(matches!(
      err,
      RepoError::Api { status: 400, .. }
    ));
    assert!(!err.is_connectivity());
  }

  #[tokio::test]
  async fn success_passes_through_and_decodes()
  {
    let resp = check_response(
      mock_response(
        200,
        r#"[{"id":"a","title":"x","createdAt":"2026-02-17T09:00:00","updatedAt":"2026-02-17T09:00:00"}]"#
      ),
      None
    )
    .await
    .unwrap();
    let tasks: Vec<Task> =
      decode(resp).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, "a");
  }

  #[tokio::test]
  async fn malformed_body_is_a_decode_error() {
    let err = decode::<Task>(mock_response(
      200,
      "{not json"
    ))
    .await
    .unwrap_err();
    assert!(matches!(err, RepoError::Decode(_)));
  }

  #[test]
  fn path_segments_are_percent_encoded() {
    let client = ApiClient::new(
      "http://localhost:8080/task/",
      Duration::from_secs(1)
    )
    .unwrap();
    assert_eq!(
      client.base_url(),
      "http://localhost:8080/task"
    );
    assert_eq!(
      client.url(&["tag", "deep work"]),
      "http://localhost:8080/task/tag/deep%20work"
    );
    assert_eq!(
      client.url(&["a/b", "complete"]),
      "http://localhost:8080/task/a%2Fb/complete"
    );
  }
}
