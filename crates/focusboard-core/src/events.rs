//! Toast notifications published by
//! mutations and the Pomodoro runner.

use std::fmt;
use std::sync::atomic::{
  AtomicU64,
  Ordering
};

use tokio::sync::broadcast;
use tracing::trace;

const CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
  Success,
  Achievement,
  Streak
}

impl fmt::Display for ToastKind {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    let name = match self {
      | ToastKind::Success => "success",
      | ToastKind::Achievement => {
        "achievement"
      }
      | ToastKind::Streak => "streak"
    };
    f.write_str(name)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
  pub id:      u64,
  pub message: String,
  pub kind:    ToastKind
}

/// Broadcast channel for toasts. Ids are
/// sequential per bus, starting at 1.
#[derive(Debug)]
pub struct EventBus {
  sender:  broadcast::Sender<Toast>,
  next_id: AtomicU64
}

impl Default for EventBus {
  fn default() -> Self {
    Self::new()
  }
}

impl EventBus {
  pub fn new() -> Self {
    let (sender, _) =
      broadcast::channel(CHANNEL_CAPACITY);
    Self {
      sender,
      next_id: AtomicU64::new(1)
    }
  }

  /// Dropping the receiver unsubscribes.
  pub fn subscribe(
    &self
  ) -> broadcast::Receiver<Toast> {
    self.sender.subscribe()
  }

  pub fn publish(
    &self,
    message: impl Into<String>,
    kind: ToastKind
  ) -> Toast {
    let toast = Toast {
      id: self
        .next_id
        .fetch_add(1, Ordering::Relaxed),
      message: message.into(),
      kind
    };
    // No subscribers is fine.
    let delivered = self
      .sender
      .send(toast.clone())
      .unwrap_or(0);
    trace!(
      id = toast.id,
      %kind,
      delivered,
      "toast published"
    );
    toast
  }

  pub fn success(
    &self,
    message: impl Into<String>
  ) -> Toast {
    self.publish(message, ToastKind::Success)
  }

  pub fn achievement(
    &self,
    message: impl Into<String>
  ) -> Toast {
    self.publish(
      message,
      ToastKind::Achievement
    )
  }
}

#[cfg(test)]
mod tests {
  use super::{
    EventBus,
    ToastKind
  };

  #[tokio::test]
  async fn subscribers_receive_sequential_toasts()
  {
    let bus = EventBus::new();
    let mut rx = bus.subscribe();

    bus.success("Task created");
    bus.publish("3 in a row", ToastKind::Streak);

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(
      (first.id, first.message.as_str()),
      (1, "Task created")
    );
    assert_eq!(second.id, 2);
    assert_eq!(second.kind, ToastKind::Streak);
  }

  #[test]
  fn publishing_without_subscribers_is_fine() {
    let bus = EventBus::new();
    let toast =
      bus.achievement("Pomodoro complete");
    assert_eq!(toast.id, 1);
    assert_eq!(bus.success("again").id, 2);
  }

  #[tokio::test]
  async fn dropped_receiver_unsubscribes() {
    let bus = EventBus::new();
    let rx = bus.subscribe();
    drop(rx);
    let mut late = bus.subscribe();
    bus.success("after");
    assert_eq!(
      late.recv().await.unwrap().message,
      "after"
    );
  }
}
