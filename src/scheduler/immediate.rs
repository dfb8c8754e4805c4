use super::{Action, Duration, Instant, Scheduler, TaskHandle};

/// Runs every action inline on the calling thread.
///
/// Delays are ignored: `schedule_after` runs the action right away. Useful for
/// tests of operators whose timing does not matter, and as the "no hop"
/// argument to `receive_on`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
  fn now(&self) -> Instant { Instant::now() }

  fn schedule_action(&self, action: Action, _delay: Option<Duration>) -> TaskHandle {
    action();
    TaskHandle::finished()
  }
}
