//! Drives the store's Pomodoro countdown
//! in real time.

use std::time::Duration;

use focusboard_shared::Task;
use tokio::time::{
  MissedTickBehavior,
  interval
};
use tracing::{
  debug,
  info,
  instrument,
  warn
};

use crate::fetch::Fetcher;
use crate::store::TaskStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
  /// The countdown reached zero. Carries
  /// the credited task, if one was bound
  /// to the timer and the credit was
  /// saved.
  Completed(Option<Task>),
  /// The timer was stopped early.
  Stopped { remaining_secs: u32 }
}

/// Ticks the running timer once per
/// `period` until it stops. `on_tick`
/// sees the store after every tick and
/// may stop the timer itself.
///
/// A natural finish publishes an
/// achievement toast and credits the
/// bound task through
/// [`Fetcher::record_pomodoro`]. A failed
/// credit is logged; the session still
/// counts as completed.
#[instrument(skip_all, fields(
  task_id = ?store.pomodoro().task_id
))]
pub async fn run_session<F>(
  store: &mut TaskStore,
  fetcher: &mut Fetcher,
  period: Duration,
  mut on_tick: F
) -> SessionOutcome
where
  F: FnMut(&mut TaskStore)
{
  let session_secs =
    store.pomodoro().session_secs;
  let task_id =
    store.pomodoro().task_id.clone();

  let mut ticker = interval(period);
  ticker.set_missed_tick_behavior(
    MissedTickBehavior::Delay
  );
  // The first tick resolves immediately.
  ticker.tick().await;

  while store.pomodoro().running {
    ticker.tick().await;

    let before =
      store.pomodoro().remaining_secs;
    store.tick_pomodoro();
    let finished =
      !store.pomodoro().running
        && before <= 1;
    on_tick(store);

    if finished {
      info!(
        session_secs,
        "pomodoro finished"
      );
      fetcher.events().achievement(
        "Pomodoro complete! Time for a \
         break."
      );
      let Some(id) = task_id.as_deref()
      else {
        return SessionOutcome::Completed(
          None
        );
      };
      let credited = match fetcher
        .record_pomodoro(
          store,
          id,
          session_secs.div_ceil(60)
        )
        .await
      {
        | Ok(task) => Some(task),
        | Err(err) => {
          warn!(
            id,
            %err,
            "failed to credit pomodoro"
          );
          None
        }
      };
      return SessionOutcome::Completed(
        credited
      );
    }
  }

  let remaining_secs =
    store.pomodoro().remaining_secs;
  debug!(
    remaining_secs,
    "pomodoro stopped early"
  );
  SessionOutcome::Stopped {
    remaining_secs
  }
}
