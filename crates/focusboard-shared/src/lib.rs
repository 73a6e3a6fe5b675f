use std::fmt;
use std::str::FromStr;

use chrono::{
  DateTime,
  Utc
};
use serde::{
  Deserialize,
  Deserializer,
  Serialize
};

pub mod timestamp;

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
  Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
  Low,
  #[default]
  Medium,
  High,
  Urgent
}

impl Priority {
  pub const ALL: [Priority; 4] = [
    Priority::Low,
    Priority::Medium,
    Priority::High,
    Priority::Urgent
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      | Priority::Low => "LOW",
      | Priority::Medium => "MEDIUM",
      | Priority::High => "HIGH",
      | Priority::Urgent => "URGENT"
    }
  }
}

impl fmt::Display for Priority {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPriority(pub String);

impl fmt::Display for UnknownPriority {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "unknown priority: {} (expected \
       low, medium, high or urgent)",
      self.0
    )
  }
}

impl std::error::Error
  for UnknownPriority
{
}

impl FromStr for Priority {
  type Err = UnknownPriority;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_uppercase()
      .as_str()
    {
      | "LOW" | "L" => Ok(Priority::Low),
      | "MEDIUM" | "MED" | "M" => {
        Ok(Priority::Medium)
      }
      | "HIGH" | "H" => {
        Ok(Priority::High)
      }
      | "URGENT" | "U" => {
        Ok(Priority::Urgent)
      }
      | _ => {
        Err(UnknownPriority(
          s.to_string()
        ))
      }
    }
  }
}

/// A checklist line owned by one task,
/// addressed by its position.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct SubItem {
  #[serde(
    rename = "stepName",
    default,
    deserialize_with = "nullable"
  )]
  pub step_name:    String,
  // The remote serializes the flag
  // as `completed`.
  #[serde(
    rename = "isCompleted",
    alias = "completed",
    default
  )]
  pub is_completed: bool
}

impl SubItem {
  pub fn new(
    step_name: impl Into<String>
  ) -> Self {
    Self {
      step_name:    step_name.into(),
      is_completed: false
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(rename_all = "camelCase")]
pub struct Task {
  pub id:                 String,
  #[serde(
    default,
    deserialize_with = "nullable"
  )]
  pub title:              String,
  #[serde(
    default,
    deserialize_with = "nullable"
  )]
  pub description:        String,
  #[serde(
    default,
    deserialize_with = "nullable"
  )]
  pub tags:               Vec<String>,
  #[serde(
    default,
    deserialize_with = "nullable"
  )]
  pub steps:              Vec<SubItem>,
  #[serde(default)]
  pub completed:          bool,
  #[serde(
    default,
    deserialize_with = "nullable"
  )]
  pub priority:           Priority,
  #[serde(
    default,
    with = "timestamp::option"
  )]
  pub due_date:
    Option<DateTime<Utc>>,
  #[serde(with = "timestamp")]
  pub created_at:         DateTime<Utc>,
  #[serde(with = "timestamp")]
  pub updated_at:         DateTime<Utc>,
  #[serde(default)]
  pub focus_time_minutes: u32,
  #[serde(default)]
  pub pomodoro_count:     u32
}

impl Task {
  pub fn new(
    id: impl Into<String>,
    title: impl Into<String>,
    now: DateTime<Utc>
  ) -> Self {
    Self {
      id:                 id.into(),
      title:              title.into(),
      description:        String::new(),
      tags:               vec![],
      steps:              vec![],
      completed:          false,
      priority:           Priority::Medium,
      due_date:           None,
      created_at:         now,
      updated_at:         now,
      focus_time_minutes: 0,
      pomodoro_count:     0
    }
  }

  pub fn completed_steps(
    &self
  ) -> usize {
    self
      .steps
      .iter()
      .filter(|step| step.is_completed)
      .count()
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreate {
  pub title:       String,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub description: Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub tags:        Option<Vec<String>>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub steps:       Option<Vec<SubItem>>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub priority:    Option<Priority>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none",
    with = "timestamp::option"
  )]
  pub due_date:
    Option<DateTime<Utc>>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub title:              Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub description:
    Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub tags:
    Option<Vec<String>>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub steps:
    Option<Vec<SubItem>>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub completed:          Option<bool>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub priority:
    Option<Priority>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none",
    with = "timestamp::double_option"
  )]
  pub due_date:
    Option<Option<DateTime<Utc>>>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub focus_time_minutes:
    Option<u32>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub pomodoro_count:     Option<u32>
}

impl TaskPatch {
  pub fn is_empty(&self) -> bool {
    *self == TaskPatch::default()
  }

  /// Applies every present field to
  /// `task`. Timestamps are left to the
  /// caller.
  pub fn apply_to(
    &self,
    task: &mut Task
  ) {
    if let Some(title) = &self.title {
      task.title = title.clone();
    }
    if let Some(description) =
      &self.description
    {
      task.description =
        description.clone();
    }
    if let Some(tags) = &self.tags {
      task.tags = tags.clone();
    }
    if let Some(steps) = &self.steps {
      task.steps = steps.clone();
    }
    if let Some(completed) =
      self.completed
    {
      task.completed = completed;
    }
    if let Some(priority) =
      self.priority
    {
      task.priority = priority;
    }
    if let Some(due) = self.due_date {
      task.due_date = due;
    }
    if let Some(minutes) =
      self.focus_time_minutes
    {
      task.focus_time_minutes = minutes;
    }
    if let Some(count) =
      self.pomodoro_count
    {
      task.pomodoro_count = count;
    }
  }
}

/// Treats an explicit JSON `null` the
/// same as a missing field.
fn nullable<'de, D, T>(
  deserializer: D
) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de> + Default
{
  Option::<T>::deserialize(deserializer)
    .map(Option::unwrap_or_default)
}
