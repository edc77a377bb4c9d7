// orderflow/src/notify.rs

//! Operator notifications.
//!
//! Callers hold a [`Notifier`], a cheap cloneable handle over a bounded queue.
//! `notify` never waits: a full or closed queue drops the notification with a
//! warning. A single [`NotificationQueue`] worker drains the queue into the
//! configured [`NotificationSink`] and logs delivery failures.

use crate::ports::NotificationSink;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{event, instrument, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
  Failure,
  Success,
}

impl Color {
  pub fn hex(&self) -> &'static str {
    match self {
      Color::Failure => "#CF0003",
      Color::Success => "#23D1E1",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  pub title: String,
  pub detail: String,
  /// Short state label, e.g. "Incomplete order", "Completed".
  pub status: String,
  pub color: Color,
}

impl Notification {
  pub fn failure(title: impl Into<String>, detail: impl Into<String>, status: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      detail: detail.into(),
      status: status.into(),
      color: Color::Failure,
    }
  }

  pub fn success(title: impl Into<String>, detail: impl Into<String>, status: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      detail: detail.into(),
      status: status.into(),
      color: Color::Success,
    }
  }
}

#[derive(Debug, Clone)]
pub struct Notifier {
  tx: mpsc::Sender<Notification>,
}

/// Receiving half of the notification queue.
#[derive(Debug)]
pub struct NotificationQueue {
  rx: mpsc::Receiver<Notification>,
}

impl Notifier {
  /// Creates a queue holding at most `capacity` undelivered notifications.
  pub fn channel(capacity: usize) -> (Notifier, NotificationQueue) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Notifier { tx }, NotificationQueue { rx })
  }

  /// Enqueues without waiting. Returns whether the notification was accepted.
  pub fn notify(&self, notification: Notification) -> bool {
    match self.tx.try_send(notification) {
      Ok(()) => true,
      Err(TrySendError::Full(dropped)) => {
        event!(Level::WARN, title = %dropped.title, "Notification queue full, dropping notification.");
        false
      }
      Err(TrySendError::Closed(dropped)) => {
        event!(Level::WARN, title = %dropped.title, "Notification worker gone, dropping notification.");
        false
      }
    }
  }
}

impl NotificationQueue {
  /// Delivers queued notifications until every `Notifier` has been dropped.
  #[instrument(name = "NotificationQueue::run", skip_all)]
  pub async fn run(mut self, sink: Arc<dyn NotificationSink>) {
    event!(Level::DEBUG, "Notification worker started.");
    while let Some(notification) = self.rx.recv().await {
      if let Err(e) = sink.deliver(&notification).await {
        event!(Level::ERROR, title = %notification.title, error = %e, "Notification delivery failed.");
      }
    }
    event!(Level::DEBUG, "Notification worker stopped.");
  }

  /// Takes the next queued notification if one is ready.
  pub fn try_recv(&mut self) -> Option<Notification> {
    self.rx.try_recv().ok()
  }

  /// Drains everything currently queued.
  pub fn drain(&mut self) -> Vec<Notification> {
    std::iter::from_fn(|| self.try_recv()).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn full_queue_drops_without_blocking() {
    let (notifier, mut queue) = Notifier::channel(1);
    assert!(notifier.notify(Notification::failure("a", "b", "c")));
    assert!(!notifier.notify(Notification::failure("d", "e", "f")));
    let queued = queue.drain();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].title, "a");
  }

  #[test]
  fn closed_queue_is_reported() {
    let (notifier, queue) = Notifier::channel(4);
    drop(queue);
    assert!(!notifier.notify(Notification::success("a", "b", "c")));
  }
}
