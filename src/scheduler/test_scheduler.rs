//! Virtual time scheduler for deterministic tests of time-based operators.
//!
//! Time only moves when the test says so. Scheduled actions run synchronously
//! on the thread that advances the clock, in due-time order and FIFO for equal
//! due times.
//!
//! ```rust
//! use rxcombine::prelude::*;
//!
//! let scheduler = TestScheduler::new();
//! let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
//! let s = seen.clone();
//! let _token = Publishers::just(42)
//!   .delay(Duration::from_millis(100), scheduler.clone())
//!   .sink(move |v| s.lock().unwrap().push(v));
//!
//! scheduler.advance_by(Duration::from_millis(99));
//! assert!(seen.lock().unwrap().is_empty());
//! scheduler.advance_by(Duration::from_millis(1));
//! assert_eq!(*seen.lock().unwrap(), vec![42]);
//! ```
//!
//! Unlike a thread-local clock every `TestScheduler` value is its own world;
//! clones share the clock and queue.

use std::{cmp::Ordering, collections::BinaryHeap};

use super::{Action, Duration, Instant, Scheduler, TaskHandle};
use crate::rc::MutArc;

struct TestSchedulerState {
  origin: Instant,
  virtual_time: Duration,
  task_queue: BinaryHeap<ScheduledTask>,
  next_task_id: usize,
}

struct ScheduledTask {
  scheduled_time: Duration,
  task_id: usize,
  action: Action,
  handle: TaskHandle,
}

impl PartialEq for ScheduledTask {
  fn eq(&self, other: &Self) -> bool {
    self.scheduled_time == other.scheduled_time && self.task_id == other.task_id
  }
}

impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for ScheduledTask {
  fn cmp(&self, other: &Self) -> Ordering {
    // Min-heap: earlier times first, then FIFO by task_id
    other
      .scheduled_time
      .cmp(&self.scheduled_time)
      .then_with(|| other.task_id.cmp(&self.task_id))
  }
}

/// A virtual time scheduler.
#[derive(Clone)]
pub struct TestScheduler(MutArc<TestSchedulerState>);

impl Default for TestScheduler {
  fn default() -> Self { Self::new() }
}

impl TestScheduler {
  pub fn new() -> Self {
    Self(MutArc::own(TestSchedulerState {
      origin: Instant::now(),
      virtual_time: Duration::ZERO,
      task_queue: BinaryHeap::new(),
      next_task_id: 0,
    }))
  }

  /// Virtual time elapsed since construction.
  pub fn elapsed(&self) -> Duration { self.0.rc_deref_mut().virtual_time }

  /// Advances the clock by `duration`, running every action that becomes due.
  pub fn advance_by(&self, duration: Duration) {
    let target = self.elapsed() + duration;
    self.advance_to(target);
  }

  /// Advances the clock to `target` (measured from construction). Actions
  /// scheduled by running actions are picked up if they fall due in time.
  pub fn advance_to(&self, target: Duration) {
    while let Some(task) = self.pop_due(target) {
      Self::execute(task);
    }
    let mut state = self.0.rc_deref_mut();
    if state.virtual_time < target {
      state.virtual_time = target;
    }
  }

  /// Runs every pending action, jumping the clock forward as needed, until the
  /// queue is empty. Returns the number of actions run.
  pub fn run(&self) -> usize {
    let mut executed = 0;
    loop {
      let task = {
        let mut state = self.0.rc_deref_mut();
        let Some(task) = state.task_queue.pop() else { break };
        if task.scheduled_time > state.virtual_time {
          state.virtual_time = task.scheduled_time;
        }
        task
      };
      if Self::execute(task) {
        executed += 1;
      }
    }
    executed
  }

  /// Actions that are scheduled and not cancelled.
  pub fn pending_count(&self) -> usize {
    self
      .0
      .rc_deref_mut()
      .task_queue
      .iter()
      .filter(|task| !task.handle.is_cancelled())
      .count()
  }

  fn pop_due(&self, target: Duration) -> Option<ScheduledTask> {
    let mut state = self.0.rc_deref_mut();
    if state.task_queue.peek()?.scheduled_time > target {
      return None;
    }
    let task = state.task_queue.pop()?;
    if task.scheduled_time > state.virtual_time {
      state.virtual_time = task.scheduled_time;
    }
    Some(task)
  }

  fn execute(task: ScheduledTask) -> bool {
    if !task.handle.begin() {
      return false;
    }
    (task.action)();
    true
  }
}

impl Scheduler for TestScheduler {
  fn now(&self) -> Instant {
    let state = self.0.rc_deref_mut();
    state.origin + state.virtual_time
  }

  /// Queues `action`; nothing runs until the clock is advanced. A `None`
  /// delay is due at the current virtual time.
  fn schedule_action(&self, action: Action, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    let mut state = self.0.rc_deref_mut();
    let task_id = state.next_task_id;
    state.next_task_id += 1;
    let scheduled_time = state.virtual_time + delay.unwrap_or(Duration::ZERO);
    state
      .task_queue
      .push(ScheduledTask { scheduled_time, task_id, action, handle: handle.clone() });
    handle
  }
}
