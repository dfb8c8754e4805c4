//! Scheduler abstraction: where and when scheduled work runs.
//!
//! Operators that involve time or thread hops (`delay`, `debounce`,
//! `throttle`, `timeout`, `receive_on`, the timer source) take a scheduler as
//! an explicit parameter. There is no ambient "current queue".
//!
//! | Scheduler              | Semantics                                              |
//! |------------------------|--------------------------------------------------------|
//! | [`ImmediateScheduler`] | runs every action inline, ignoring delays              |
//! | [`TestScheduler`]      | virtual time, advanced explicitly by the test          |
//! | [`QueueScheduler`]     | serial queue with a dedicated worker thread and timer  |
//! | `TokioScheduler`       | tokio tasks and timers (feature `tokio-scheduler`)     |
//!
//! Every scheduler runs actions that share a due time in the order they were
//! scheduled (except `TokioScheduler`, whose tasks may run in parallel).

use std::sync::{
  atomic::{AtomicU8, Ordering},
  Arc,
};

pub use std::time::{Duration, Instant};

mod immediate;
mod queue_scheduler;
pub mod test_scheduler;
#[cfg(feature = "tokio-scheduler")]
mod tokio_scheduler;

pub use immediate::ImmediateScheduler;
pub use queue_scheduler::QueueScheduler;
pub use test_scheduler::TestScheduler;
#[cfg(feature = "tokio-scheduler")]
pub use tokio_scheduler::TokioScheduler;

/// A unit of scheduled work.
pub type Action = Box<dyn FnOnce() + Send + 'static>;

/// An execution context for actions.
pub trait Scheduler: Clone + Send + Sync + 'static {
  /// The scheduler's notion of the current time.
  fn now(&self) -> Instant;

  /// Runs `action` after `delay` (as soon as possible for `None`).
  fn schedule_action(&self, action: Action, delay: Option<Duration>) -> TaskHandle;

  /// Runs `action` as soon as possible.
  fn schedule<F>(&self, action: F) -> TaskHandle
  where
    F: FnOnce() + Send + 'static,
  {
    self.schedule_action(Box::new(action), None)
  }

  /// Runs `action` once `delay` has elapsed.
  fn schedule_after<F>(&self, delay: Duration, action: F) -> TaskHandle
  where
    F: FnOnce() + Send + 'static,
  {
    self.schedule_action(Box::new(action), Some(delay))
  }
}

const PENDING: u8 = 0;
const FINISHED: u8 = 1;
const CANCELLED: u8 = 2;

/// Handle to a scheduled action.
///
/// Cancelling a handle before the action starts prevents it from running;
/// cancelling afterwards has no effect.
#[derive(Clone, Debug)]
pub struct TaskHandle(Arc<AtomicU8>);

impl TaskHandle {
  pub fn new() -> Self { Self(Arc::new(AtomicU8::new(PENDING))) }

  /// A handle for work that already ran.
  pub fn finished() -> Self { Self(Arc::new(AtomicU8::new(FINISHED))) }

  pub fn cancel(&self) {
    let _ = self
      .0
      .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire);
  }

  pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Acquire) == CANCELLED }

  pub fn is_finished(&self) -> bool { self.0.load(Ordering::Acquire) == FINISHED }

  /// Claims the action for execution; `false` if it was cancelled first.
  pub(crate) fn begin(&self) -> bool {
    self
      .0
      .compare_exchange(PENDING, FINISHED, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }
}

impl Default for TaskHandle {
  fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[rxcombine_macro::test]
  fn cancelled_handle_cannot_begin() {
    let handle = TaskHandle::new();
    handle.cancel();
    assert!(handle.is_cancelled());
    assert!(!handle.begin());
  }

  #[rxcombine_macro::test]
  fn finished_handle_ignores_cancel() {
    let handle = TaskHandle::new();
    assert!(handle.begin());
    handle.cancel();
    assert!(handle.is_finished());
    assert!(!handle.is_cancelled());
    assert!(TaskHandle::finished().is_finished());
  }
}
