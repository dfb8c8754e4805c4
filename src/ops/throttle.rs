//! Throttle operator implementation
//!
//! Lets at most one value through per interval. The first value after a quiet
//! period passes at once and opens a window; values arriving inside the
//! window collapse into one, emitted when the window closes, which opens the
//! next window.
//!
//! When the upstream finishes while a window is open, the collected value is
//! emitted right away, ahead of the completion, instead of being lost.

use super::{Relay, Timers};
use crate::{
  demand::Demand,
  publisher::Publisher,
  rc::MutArc,
  scheduler::{Duration, Scheduler},
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, Downstream, SubscriptionSlot},
};

/// Throttle operator
///
/// With `latest` the newest value of a window is kept, otherwise the first.
#[derive(Clone)]
pub struct Throttle<P, Sch> {
  pub source: P,
  pub interval: Duration,
  pub scheduler: Sch,
  pub latest: bool,
}

impl<P, Sch> Throttle<P, Sch> {
  pub fn new(source: P, interval: Duration, scheduler: Sch, latest: bool) -> Self {
    Self { source, interval, scheduler, latest }
  }
}

impl<P, Sch> Publisher for Throttle<P, Sch>
where
  P: Publisher,
  Sch: Scheduler,
{
  type Output = P::Output;
  type Failure = P::Failure;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Output, P::Failure>,
  {
    let downstream = Downstream::new(subscriber);
    let upstream = SubscriptionSlot::default();
    let timers = Timers::default();
    let cancel_timers = timers.clone();
    Relay::single(downstream.clone(), upstream.clone())
      .on_cancel(move || cancel_timers.cancel_all())
      .attach();
    let window = Window {
      downstream,
      timers,
      state: MutArc::own(WindowState { open: false, pending: None }),
      interval: self.interval,
      scheduler: self.scheduler.clone(),
    };
    self
      .source
      .subscribe(ThrottleSubscriber { window, upstream, latest: self.latest });
  }
}

struct WindowState<T> {
  open: bool,
  pending: Option<T>,
}

struct Window<T, E, Sch> {
  downstream: Downstream<T, E>,
  timers: Timers,
  state: MutArc<WindowState<T>>,
  interval: Duration,
  scheduler: Sch,
}

impl<T, E, Sch: Clone> Clone for Window<T, E, Sch> {
  fn clone(&self) -> Self {
    Self {
      downstream: self.downstream.clone(),
      timers: self.timers.clone(),
      state: self.state.clone(),
      interval: self.interval,
      scheduler: self.scheduler.clone(),
    }
  }
}

impl<T, E, Sch> Window<T, E, Sch>
where
  T: Send + 'static,
  E: Send + 'static,
  Sch: Scheduler,
{
  /// Schedules the end of the current window.
  fn schedule_close(&self) {
    let window = self.clone();
    let handle = self.scheduler.schedule_after(self.interval, move || window.close());
    self.timers.track(handle);
  }

  fn close(self) {
    let pending = {
      let mut state = self.state.rc_deref_mut();
      let pending = state.pending.take();
      state.open = pending.is_some();
      pending
    };
    if let Some(value) = pending {
      self.downstream.offer_latest(value);
      self.schedule_close();
    }
  }
}

pub struct ThrottleSubscriber<T, E, Sch> {
  window: Window<T, E, Sch>,
  upstream: SubscriptionSlot,
  latest: bool,
}

impl<T, E, Sch> Subscriber<T, E> for ThrottleSubscriber<T, E, Sch>
where
  T: Send + 'static,
  E: Send + 'static,
  Sch: Scheduler,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.upstream.set(subscription);
    self.upstream.request(Demand::Unlimited);
  }

  fn on_value(&mut self, value: T) -> Demand {
    let immediate = {
      let mut state = self.window.state.rc_deref_mut();
      if !state.open {
        state.open = true;
        Some(value)
      } else {
        if self.latest || state.pending.is_none() {
          state.pending = Some(value);
        }
        None
      }
    };
    if let Some(value) = immediate {
      self.window.downstream.offer_latest(value);
      self.window.schedule_close();
    }
    Demand::NONE
  }

  fn on_completion(&mut self, completion: Completion<E>) {
    self.upstream.release();
    self.window.timers.cancel_all();
    let pending = self.window.state.rc_deref_mut().pending.take();
    match completion {
      Completion::Finished => {
        if let Some(value) = pending {
          self.window.downstream.offer_latest(value);
        }
        self.window.downstream.finish(Completion::Finished);
      }
      Completion::Failure(e) => self.window.downstream.finish(Completion::Failure(e)),
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::{
    prelude::*,
    test_util::{Event, Recorder},
  };

  fn throttled(latest: bool) -> Vec<i32> {
    let scheduler = TestScheduler::new();
    let subject = PassthroughSubject::<i32, Never>::new();
    let (recorder, record) = Recorder::<i32, Never>::unlimited();
    subject
      .clone()
      .throttle(Duration::from_millis(100), scheduler.clone(), latest)
      .subscribe(recorder);
    for (at, value) in [(0, 1), (10, 2), (20, 3), (150, 4), (260, 5)] {
      scheduler.advance_to(Duration::from_millis(at));
      subject.send(value);
    }
    scheduler.advance_to(Duration::from_millis(1000));
    record.values()
  }

  #[rxcombine_macro::test]
  fn keeps_the_newest_value_of_a_window() {
    // 1 opens [0, 100), 3 closes it and opens [100, 200) which takes 4;
    // 4 opens [200, 300) which takes 5.
    assert_eq!(throttled(true), vec![1, 3, 4, 5]);
  }

  #[rxcombine_macro::test]
  fn keeps_the_first_value_of_a_window() {
    assert_eq!(throttled(false), vec![1, 2, 4, 5]);
  }

  #[rxcombine_macro::test]
  fn at_most_one_value_per_interval() {
    let scheduler = TestScheduler::new();
    let (recorder, record) = Recorder::<usize, Never>::unlimited();
    Publishers::timer(Duration::from_millis(10), scheduler.clone())
      .throttle(Duration::from_millis(100), scheduler.clone(), true)
      .subscribe(recorder);
    scheduler.advance_to(Duration::from_millis(1000));
    let values = record.values();
    assert!(values.len() <= 11, "got {values:?}");
    assert_eq!(values.first(), Some(&0));
  }

  #[rxcombine_macro::test]
  fn finish_emits_the_collected_value_inside_the_window() {
    let scheduler = TestScheduler::new();
    let subject = PassthroughSubject::<i32, Never>::new();
    let (recorder, record) = Recorder::<i32, Never>::unlimited();
    subject
      .clone()
      .throttle(Duration::from_millis(100), scheduler.clone(), true)
      .subscribe(recorder);
    subject.send(1);
    subject.send(2);
    assert_eq!(record.values(), vec![1]);
    subject.send_completion(Completion::Finished);
    assert_eq!(scheduler.elapsed(), Duration::ZERO);
    assert_eq!(
      record.events(),
      vec![Event::Value(1), Event::Value(2), Event::Completion(Completion::Finished)]
    );
    assert_eq!(scheduler.pending_count(), 0);
  }
}
