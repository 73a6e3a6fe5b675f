use anyhow::{
  Context,
  bail
};
use chrono::Utc;
use focusboard_shared::{
  Priority,
  SubItem,
  TaskCreate,
  TaskPatch
};
use tracing::{
  debug,
  info,
  instrument
};

use super::App;
use crate::datetime::parse_due_expr;

#[derive(Debug, Clone, Default)]
pub(super) struct AddOptions {
  pub title:       String,
  pub description: Option<String>,
  pub tags:        Vec<String>,
  pub steps:       Vec<String>,
  pub priority:    Option<String>,
  pub due:         Option<String>
}

#[derive(Debug, Clone, Default)]
pub(super) struct EditOptions {
  pub title:       Option<String>,
  pub description: Option<String>,
  pub tags:        Vec<String>,
  pub priority:    Option<String>,
  pub due:         Option<String>,
  pub clear_due:   bool
}

fn parse_priority(
  raw: Option<&str>
) -> anyhow::Result<Option<Priority>> {
  raw
    .map(str::parse::<Priority>)
    .transpose()
    .map_err(Into::into)
}

fn normalize_tags(
  tags: Vec<String>
) -> Vec<String> {
  let mut out: Vec<String> =
    Vec::with_capacity(tags.len());
  for tag in tags {
    let tag = tag
      .trim()
      .trim_start_matches('#')
      .to_string();
    if !tag.is_empty() && !out.contains(&tag)
    {
      out.push(tag);
    }
  }
  out
}

/// Builds the patch for `edit`. A cleared
/// due date is `Some(None)`.
fn edit_patch(
  opts: EditOptions,
  now: chrono::DateTime<Utc>
) -> anyhow::Result<TaskPatch> {
  let due_date = if opts.clear_due {
    Some(None)
  } else {
    opts
      .due
      .as_deref()
      .map(|expr| parse_due_expr(expr, now))
      .transpose()?
      .map(Some)
  };

  Ok(TaskPatch {
    title: opts
      .title
      .map(|t| t.trim().to_string()),
    description: opts.description,
    tags: (!opts.tags.is_empty())
      .then(|| normalize_tags(opts.tags)),
    priority: parse_priority(
      opts.priority.as_deref()
    )?,
    due_date,
    ..TaskPatch::default()
  })
}

#[instrument(skip(app, opts), fields(
  title = %opts.title
))]
pub(super) async fn cmd_add(
  app: &mut App,
  opts: AddOptions
) -> anyhow::Result<()> {
  info!("command add");
  let now = Utc::now();

  let due_date = opts
    .due
    .as_deref()
    .map(|expr| parse_due_expr(expr, now))
    .transpose()?;
  let tags = normalize_tags(opts.tags);
  let steps: Vec<SubItem> = opts
    .steps
    .iter()
    .map(SubItem::new)
    .collect();

  let input = TaskCreate {
    title: opts.title.trim().to_string(),
    description: opts.description,
    tags: (!tags.is_empty()).then_some(tags),
    steps: (!steps.is_empty())
      .then_some(steps),
    priority: parse_priority(
      opts.priority.as_deref()
    )?,
    due_date
  };

  let task = app
    .fetcher
    .create(&mut app.store, input)
    .await
    .context("failed to create task")?;

  debug!(id = %task.id, "task added");
  println!("Created task {}.", task.id);
  Ok(())
}

#[instrument(skip(app, opts))]
pub(super) async fn cmd_edit(
  app: &mut App,
  id: &str,
  opts: EditOptions
) -> anyhow::Result<()> {
  info!("command edit");
  let patch = edit_patch(opts, Utc::now())?;
  if patch.is_empty() {
    bail!("nothing to change for task {id}");
  }

  let task = app
    .fetcher
    .update(&mut app.store, id, patch)
    .await
    .with_context(|| {
      format!("failed to modify task {id}")
    })?;
  println!("Modified task {}.", task.id);
  Ok(())
}

#[instrument(skip(app))]
pub(super) async fn cmd_done(
  app: &mut App,
  id: &str
) -> anyhow::Result<()> {
  info!("command done");
  let task = app
    .fetcher
    .toggle_complete(&mut app.store, id)
    .await
    .with_context(|| {
      format!("failed to toggle task {id}")
    })?;

  if task.completed {
    println!(
      "Completed task {} '{}'.",
      task.id, task.title
    );
  } else {
    println!(
      "Reopened task {} '{}'.",
      task.id, task.title
    );
  }
  Ok(())
}

#[instrument(skip(app))]
pub(super) async fn cmd_step(
  app: &mut App,
  id: &str,
  index: usize
) -> anyhow::Result<()> {
  info!("command step");
  let task = app
    .fetcher
    .toggle_step(&mut app.store, id, index)
    .await
    .with_context(|| {
      format!(
        "failed to toggle step {index} of \
         task {id}"
      )
    })?;

  if let Some(step) = task.steps.get(index)
  {
    let state = if step.is_completed {
      "done"
    } else {
      "open"
    };
    println!(
      "Step {index} '{}' is {state} \
       ({}/{}).",
      step.step_name,
      task.completed_steps(),
      task.steps.len()
    );
  }
  Ok(())
}

#[instrument(skip(app))]
pub(super) async fn cmd_rm(
  app: &mut App,
  id: &str
) -> anyhow::Result<()> {
  info!("command rm");
  app
    .fetcher
    .delete(&mut app.store, id)
    .await
    .with_context(|| {
      format!("failed to delete task {id}")
    })?;
  println!("Deleted task {id}.");
  Ok(())
}

#[cfg(test)]
mod tests {
  use chrono::{
    TimeZone,
    Utc
  };
  use focusboard_shared::Priority;

  use super::{
    EditOptions,
    edit_patch,
    normalize_tags,
    parse_priority
  };

  #[test]
  fn tags_are_trimmed_and_deduplicated() {
    let tags = vec![
      " #work".to_string(),
      "work".to_string(),
      "".to_string(),
      "deep".to_string(),
    ];
    assert_eq!(
      normalize_tags(tags),
      vec!["work", "deep"]
    );
  }

  #[test]
  fn priority_flag_is_optional() {
    assert_eq!(
      parse_priority(None).unwrap(),
      None
    );
    assert_eq!(
      parse_priority(Some("h")).unwrap(),
      Some(Priority::High)
    );
    assert!(
      parse_priority(Some("soon")).is_err()
    );
  }

  #[test]
  fn clear_due_becomes_an_explicit_null() {
    let now = Utc
      .with_ymd_and_hms(2026, 2, 17, 9, 0, 0)
      .unwrap();
    let patch = edit_patch(
      EditOptions {
        clear_due: true,
        ..EditOptions::default()
      },
      now
    )
    .unwrap();
    assert_eq!(patch.due_date, Some(None));
    assert!(!patch.is_empty());

    let empty =
      edit_patch(EditOptions::default(), now)
        .unwrap();
    assert!(empty.is_empty());

    assert!(
      edit_patch(
        EditOptions {
          due: Some("+99999999d".into()),
          ..EditOptions::default()
        },
        now
      )
      .is_err()
    );
  }
}
