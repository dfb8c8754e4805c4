//! Delay operator implementation
//!
//! Shifts every value and the normal finish by a fixed duration. A failure is
//! not delayed: it cancels the pending deliveries and is reported at once.

use super::{Relay, Timers};
use crate::{
  demand::Demand,
  publisher::Publisher,
  scheduler::{Duration, Scheduler},
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, Downstream, SubscriptionSlot},
};

// ==================== Delay Operator ====================

/// Delay operator
///
/// Demand is forwarded to the upstream unchanged; delayed values that
/// outrun the downstream's demand wait in the downstream queue.
#[derive(Clone)]
pub struct Delay<P, Sch> {
  pub source: P,
  pub duration: Duration,
  pub scheduler: Sch,
}

impl<P, Sch> Delay<P, Sch> {
  pub fn new(source: P, duration: Duration, scheduler: Sch) -> Self {
    Self { source, duration, scheduler }
  }
}

impl<P, Sch> Publisher for Delay<P, Sch>
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
    self.source.subscribe(DelaySubscriber {
      downstream,
      upstream,
      timers,
      duration: self.duration,
      scheduler: self.scheduler.clone(),
    });
  }
}

// ==================== Subscriber ====================

pub struct DelaySubscriber<T, E, Sch> {
  downstream: Downstream<T, E>,
  upstream: SubscriptionSlot,
  timers: Timers,
  duration: Duration,
  scheduler: Sch,
}

impl<T, E, Sch> Subscriber<T, E> for DelaySubscriber<T, E, Sch>
where
  T: Send + 'static,
  E: Send + 'static,
  Sch: Scheduler,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.upstream.set(subscription); }

  fn on_value(&mut self, value: T) -> Demand {
    let downstream = self.downstream.clone();
    let handle = self
      .scheduler
      .schedule_after(self.duration, move || downstream.push(value));
    self.timers.track(handle);
    Demand::NONE
  }

  fn on_completion(&mut self, completion: Completion<E>) {
    self.upstream.release();
    match completion {
      Completion::Finished => {
        let downstream = self.downstream.clone();
        let handle = self
          .scheduler
          .schedule_after(self.duration, move || downstream.finish(Completion::Finished));
        self.timers.track(handle);
      }
      Completion::Failure(e) => {
        self.timers.cancel_all();
        self.downstream.finish(Completion::Failure(e));
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::{
    prelude::*,
    test_util::{Event, Recorder},
  };

  #[rxcombine_macro::test]
  fn shifts_values_and_finish() {
    let scheduler = TestScheduler::new();
    let (recorder, record) = Recorder::<i32, Never>::unlimited();
    Publishers::sequence(vec![1, 2])
      .delay(Duration::from_millis(50), scheduler.clone())
      .subscribe(recorder);

    scheduler.advance_by(Duration::from_millis(49));
    assert!(record.events().is_empty());
    scheduler.advance_by(Duration::from_millis(1));
    assert_eq!(
      record.events(),
      vec![Event::Value(1), Event::Value(2), Event::Completion(Completion::Finished)]
    );
  }

  #[rxcombine_macro::test]
  fn failure_is_not_delayed() {
    let scheduler = TestScheduler::new();
    let subject = PassthroughSubject::<i32, &str>::new();
    let (recorder, record) = Recorder::<i32, &str>::unlimited();
    subject
      .clone()
      .delay(Duration::from_millis(50), scheduler.clone())
      .subscribe(recorder);

    subject.send(1);
    subject.send_completion(Completion::Failure("boom"));
    assert_eq!(record.events(), vec![Event::Completion(Completion::Failure("boom"))]);
    assert_eq!(scheduler.pending_count(), 0);
  }

  #[rxcombine_macro::test]
  fn cancel_drops_pending_values() {
    let scheduler = TestScheduler::new();
    let subject = PassthroughSubject::<i32, Never>::new();
    let (recorder, record) = Recorder::<i32, Never>::unlimited();
    subject
      .clone()
      .delay(Duration::from_millis(10), scheduler.clone())
      .subscribe(recorder);

    subject.send(1);
    record.cancel();
    scheduler.run();
    assert!(record.events().is_empty());
    assert_eq!(subject.subscriber_count(), 0);
  }
}
