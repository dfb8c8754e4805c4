use std::sync::Arc;

use super::Publisher;
use crate::{
  ops::{Relay, Timers},
  scheduler::{Duration, Scheduler},
  subscriber::{Never, Subscriber},
  subscription::Downstream,
};

/// Emits the tick index `0, 1, 2, …` every `period` until cancelled.
///
/// A tick that finds no outstanding demand is dropped; the index keeps
/// counting periods. The ticks are driven by the scheduler, so a scheduler
/// that ignores delays (such as
/// [`ImmediateScheduler`](crate::scheduler::ImmediateScheduler)) would tick
/// without pause.
#[derive(Clone)]
pub struct Timer<Sch> {
  period: Duration,
  scheduler: Sch,
}

impl<Sch> Timer<Sch> {
  pub fn new(period: Duration, scheduler: Sch) -> Self { Self { period, scheduler } }
}

impl<Sch: Scheduler> Publisher for Timer<Sch> {
  type Output = usize;
  type Failure = Never;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<usize, Never>,
  {
    let downstream = Downstream::new(subscriber);
    let timers = Timers::default();
    let cancel_timers = timers.clone();
    Relay::new(downstream.clone(), Arc::from(Vec::new()))
      .on_cancel(move || cancel_timers.cancel_all())
      .attach();
    let ticker = Ticker { downstream, timers, scheduler: self.scheduler.clone(), period: self.period };
    ticker.schedule(0);
  }
}

struct Ticker<Sch> {
  downstream: Downstream<usize, Never>,
  timers: Timers,
  scheduler: Sch,
  period: Duration,
}

impl<Sch: Scheduler> Ticker<Sch> {
  fn schedule(self, tick: usize) {
    if self.downstream.is_closed() {
      return;
    }
    let timers = self.timers.clone();
    let scheduler = self.scheduler.clone();
    let handle = scheduler.schedule_after(self.period, move || {
      if !self.downstream.offer(tick) {
        tracing::trace!(tick, "timer tick dropped without demand");
      }
      self.schedule(tick + 1);
    });
    timers.track(handle);
  }
}

#[cfg(test)]
mod tests {
  use crate::{prelude::*, test_util::Recorder};

  #[rxcombine_macro::test]
  fn ticks_every_period() {
    let scheduler = TestScheduler::new();
    let (recorder, record) = Recorder::<usize, Never>::unlimited();
    Publishers::timer(Duration::from_millis(10), scheduler.clone()).subscribe(recorder);
    scheduler.advance_by(Duration::from_millis(35));
    assert_eq!(record.values(), vec![0, 1, 2]);
    record.cancel();
    scheduler.advance_by(Duration::from_millis(100));
    assert_eq!(record.values(), vec![0, 1, 2]);
    assert_eq!(scheduler.pending_count(), 0);
  }

  #[rxcombine_macro::test]
  fn ticks_without_demand_are_dropped() {
    let scheduler = TestScheduler::new();
    let (recorder, record) = Recorder::<usize, Never>::with_demand(Demand::max(1));
    Publishers::timer(Duration::from_millis(10), scheduler.clone()).subscribe(recorder);
    scheduler.advance_by(Duration::from_millis(30));
    assert_eq!(record.values(), vec![0]);
    record.request(Demand::max(1));
    scheduler.advance_by(Duration::from_millis(10));
    assert_eq!(record.values(), vec![0, 3]);
  }
}
