use std::io::{
  self,
  Write
};
use std::time::Duration;

use tracing::{
  info,
  instrument,
  warn
};

use super::App;
use crate::datetime::format_clock;
use crate::error::RepoError;
use crate::pomodoro::{
  SessionOutcome,
  run_session
};
use crate::store::TaskStore;

const TICK: Duration =
  Duration::from_secs(1);

#[instrument(skip(app))]
pub(super) async fn cmd_focus(
  app: &mut App,
  id: &str
) -> anyhow::Result<()> {
  info!("command focus");
  let title = app
    .store
    .task(id)
    .map(|task| task.title.clone())
    .ok_or_else(|| {
      RepoError::NotFound(id.to_string())
    })?;

  app.store.set_selected_task_id(Some(id));
  app.store.reset_pomodoro();
  app.store.start_pomodoro(id);
  println!(
    "Focusing on '{title}' for {}. \
     Ctrl-C to stop.",
    format_clock(
      app.store.pomodoro().session_secs
    )
  );

  let renderer = app.renderer.clone();
  let on_tick = |store: &mut TaskStore| {
    let mut out = io::stdout().lock();
    let _ = write!(
      out,
      "\r{}\x1b[K",
      renderer
        .clock_line(store.pomodoro(), &title)
    );
    let _ = out.flush();
  };

  let outcome = tokio::select! {
    outcome = run_session(
      &mut app.store,
      &mut app.fetcher,
      TICK,
      on_tick
    ) => Some(outcome),
    signal = tokio::signal::ctrl_c() => {
      if let Err(err) = signal {
        warn!(
          %err,
          "failed to listen for ctrl-c"
        );
      }
      None
    }
  };
  println!();

  match outcome {
    | Some(SessionOutcome::Completed(Some(
      task
    ))) => {
      println!(
        "Pomodoro complete. '{}' now has \
         {} pomodoro(s), {} min of focus.",
        task.title,
        task.pomodoro_count,
        task.focus_time_minutes
      )
    }
    | Some(SessionOutcome::Completed(
      None
    )) => println!("Pomodoro complete."),
    | Some(SessionOutcome::Stopped {
      remaining_secs
    }) => {
      println!(
        "Stopped with {} left.",
        format_clock(remaining_secs)
      )
    }
    | None => {
      app.store.stop_pomodoro();
      println!(
        "Stopped with {} left.",
        format_clock(
          app.store.pomodoro().remaining_secs
        )
      );
    }
  }
  if app.store.is_focus_mode() {
    app.store.toggle_focus_mode(None);
  }
  Ok(())
}
