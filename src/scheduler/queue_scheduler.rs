use std::{
  cmp::Ordering,
  collections::BinaryHeap,
  io,
  sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
  thread,
};

use super::{Action, Duration, Instant, Scheduler, TaskHandle};

struct QueuedTask {
  due: Instant,
  task_id: usize,
  action: Action,
  handle: TaskHandle,
}

impl PartialEq for QueuedTask {
  fn eq(&self, other: &Self) -> bool { self.due == other.due && self.task_id == other.task_id }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for QueuedTask {
  fn cmp(&self, other: &Self) -> Ordering {
    other
      .due
      .cmp(&self.due)
      .then_with(|| other.task_id.cmp(&self.task_id))
  }
}

#[derive(Default)]
struct QueueState {
  tasks: BinaryHeap<QueuedTask>,
  next_task_id: usize,
  shutdown: bool,
}

#[derive(Default)]
struct Shared {
  state: Mutex<QueueState>,
  wakeup: Condvar,
}

impl Shared {
  fn lock(&self) -> MutexGuard<'_, QueueState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

/// Stops the worker once the last scheduler handle is gone.
struct Owner(Arc<Shared>);

impl Drop for Owner {
  fn drop(&mut self) {
    self.0.lock().shutdown = true;
    self.0.wakeup.notify_all();
  }
}

/// A serial queue backed by one dedicated worker thread.
///
/// Actions run one at a time on the worker, ordered by due time and FIFO for
/// equal due times. The worker sleeps on a condition variable until the next
/// action falls due, so waiting never spins. Dropping the last clone stops the
/// worker; actions still queued at that point are discarded.
#[derive(Clone)]
pub struct QueueScheduler {
  shared: Arc<Shared>,
  name: Arc<str>,
  _owner: Arc<Owner>,
}

impl QueueScheduler {
  /// Spawns the worker thread, named `name`.
  pub fn new(name: &str) -> io::Result<Self> {
    let shared = Arc::new(Shared::default());
    let worker = shared.clone();
    thread::Builder::new()
      .name(name.to_owned())
      .spawn(move || run_worker(&worker))?;
    tracing::trace!(name, "queue scheduler started");
    Ok(Self { shared: shared.clone(), name: name.into(), _owner: Arc::new(Owner(shared)) })
  }

  pub fn name(&self) -> &str { &self.name }
}

fn run_worker(shared: &Shared) {
  let mut state = shared.lock();
  loop {
    if state.shutdown {
      break;
    }
    let now = Instant::now();
    let wait = match state.tasks.peek() {
      None => None,
      Some(task) if task.due <= now => Some(Duration::ZERO),
      Some(task) => Some(task.due - now),
    };
    match wait {
      None => {
        state = shared
          .wakeup
          .wait(state)
          .unwrap_or_else(PoisonError::into_inner);
      }
      Some(wait) if wait.is_zero() => {
        let Some(task) = state.tasks.pop() else { continue };
        drop(state);
        if task.handle.begin() {
          (task.action)();
        }
        state = shared.lock();
      }
      Some(wait) => {
        state = shared
          .wakeup
          .wait_timeout(state, wait)
          .unwrap_or_else(PoisonError::into_inner)
          .0;
      }
    }
  }
  let discarded = std::mem::take(&mut state.tasks);
  drop(state);
  tracing::trace!(discarded = discarded.len(), "queue scheduler stopped");
}

impl Scheduler for QueueScheduler {
  fn now(&self) -> Instant { Instant::now() }

  fn schedule_action(&self, action: Action, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    let due = Instant::now() + delay.unwrap_or(Duration::ZERO);
    let mut state = self.shared.lock();
    let task_id = state.next_task_id;
    state.next_task_id += 1;
    state
      .tasks
      .push(QueuedTask { due, task_id, action, handle: handle.clone() });
    drop(state);
    self.shared.wakeup.notify_one();
    handle
  }
}
