//! Timeout operator implementation
//!
//! Fails the stream when the upstream stays silent for longer than the
//! timeout. The deadline starts at subscription and restarts with every
//! value.

use std::sync::{
  atomic::{AtomicU64, Ordering},
  Arc,
};

use super::{Relay, Timers};
use crate::{
  demand::Demand,
  error::TimeoutError,
  publisher::Publisher,
  scheduler::{Duration, Scheduler},
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, Downstream, SubscriptionSlot},
};

#[derive(Clone)]
pub struct Timeout<P, Sch> {
  pub source: P,
  pub duration: Duration,
  pub scheduler: Sch,
}

impl<P, Sch> Timeout<P, Sch> {
  pub fn new(source: P, duration: Duration, scheduler: Sch) -> Self {
    Self { source, duration, scheduler }
  }
}

impl<P, Sch> Publisher for Timeout<P, Sch>
where
  P: Publisher,
  Sch: Scheduler,
{
  type Output = P::Output;
  type Failure = TimeoutError<P::Failure>;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Self::Output, Self::Failure>,
  {
    let downstream = Downstream::new(subscriber);
    let upstream = SubscriptionSlot::default();
    let timers = Timers::default();
    let cancel_timers = timers.clone();
    Relay::single(downstream.clone(), upstream.clone())
      .on_cancel(move || cancel_timers.cancel_all())
      .attach();
    let deadline = Deadline {
      downstream,
      upstream,
      timers,
      generation: Arc::new(AtomicU64::new(0)),
      duration: self.duration,
      scheduler: self.scheduler.clone(),
    };
    deadline.arm();
    self.source.subscribe(TimeoutSubscriber(deadline));
  }
}

struct Deadline<T, E, Sch> {
  downstream: Downstream<T, TimeoutError<E>>,
  upstream: SubscriptionSlot,
  timers: Timers,
  generation: Arc<AtomicU64>,
  duration: Duration,
  scheduler: Sch,
}

impl<T, E, Sch> Deadline<T, E, Sch>
where
  T: Send + 'static,
  E: Send + 'static,
  Sch: Scheduler,
{
  /// Replaces the running deadline by a fresh one.
  fn arm(&self) {
    self.timers.cancel_all();
    let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
    let current = self.generation.clone();
    let downstream = self.downstream.clone();
    let upstream = self.upstream.clone();
    let duration = self.duration;
    let handle = self.scheduler.schedule_after(duration, move || {
      if current.load(Ordering::Acquire) != generation {
        return;
      }
      tracing::debug!(?duration, "timeout elapsed, cancelling upstream");
      upstream.cancel();
      downstream.finish(Completion::Failure(TimeoutError::Elapsed(duration)));
    });
    self.timers.track(handle);
  }

  fn disarm(&self) {
    self.generation.fetch_add(1, Ordering::AcqRel);
    self.timers.cancel_all();
  }
}

pub struct TimeoutSubscriber<T, E, Sch>(Deadline<T, E, Sch>);

impl<T, E, Sch> Subscriber<T, E> for TimeoutSubscriber<T, E, Sch>
where
  T: Send + 'static,
  E: Send + 'static,
  Sch: Scheduler,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.0.upstream.set(subscription); }

  fn on_value(&mut self, value: T) -> Demand {
    self.0.arm();
    self.0.downstream.push(value);
    Demand::NONE
  }

  fn on_completion(&mut self, completion: Completion<E>) {
    self.0.disarm();
    self.0.upstream.release();
    self
      .0
      .downstream
      .finish(completion.map_failure(TimeoutError::Upstream));
  }
}
