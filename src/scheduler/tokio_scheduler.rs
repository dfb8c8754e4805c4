use tokio::runtime::Handle;

use super::{Action, Duration, Instant, Scheduler, TaskHandle};

/// Runs actions as tokio tasks, delayed ones after a `tokio::time::sleep`.
///
/// Tasks may run in parallel on a multi-threaded runtime, so relative order is
/// only kept for actions scheduled on a current-thread runtime.
#[derive(Clone, Debug)]
pub struct TokioScheduler {
  handle: Handle,
}

impl TokioScheduler {
  pub fn new(handle: Handle) -> Self { Self { handle } }

  /// Uses the runtime the caller is running in.
  ///
  /// # Panics
  ///
  /// When called outside a tokio runtime.
  pub fn current() -> Self { Self::new(Handle::current()) }
}

impl Scheduler for TokioScheduler {
  fn now(&self) -> Instant { tokio::time::Instant::now().into_std() }

  fn schedule_action(&self, action: Action, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    let task = handle.clone();
    self.handle.spawn(async move {
      if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
      }
      if task.begin() {
        action();
      }
    });
    handle
  }
}

#[cfg(test)]
mod tests {
  use tokio::sync::oneshot;

  use super::*;

  #[rxcombine_macro::test]
  async fn delayed_action_runs_on_runtime() {
    let scheduler = TokioScheduler::current();
    let (tx, rx) = oneshot::channel();
    scheduler.schedule_after(Duration::from_millis(10), move || {
      let _ = tx.send(7);
    });
    assert_eq!(rx.await.unwrap(), 7);
  }

  #[rxcombine_macro::test]
  async fn cancelled_action_never_runs() {
    let scheduler = TokioScheduler::current();
    let (tx, rx) = oneshot::channel::<()>();
    let handle = scheduler.schedule_after(Duration::from_millis(10), move || {
      let _ = tx.send(());
    });
    handle.cancel();
    assert!(rx.await.is_err());
  }
}
