//! Debounce operator implementation
//!
//! Emits a value only once the upstream has been quiet for the debounce
//! duration after it; a newer value restarts the quiet period and replaces
//! the pending one.

use super::{Relay, Timers};
use crate::{
  demand::Demand,
  publisher::Publisher,
  rc::MutArc,
  scheduler::{Duration, Scheduler},
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, Downstream, SubscriptionSlot},
};

/// Debounce operator
///
/// The upstream is drained without limit. A value that becomes due while the
/// downstream has no demand replaces any older undelivered one.
#[derive(Clone)]
pub struct Debounce<P, Sch> {
  pub source: P,
  pub duration: Duration,
  pub scheduler: Sch,
}

impl<P, Sch> Debounce<P, Sch> {
  pub fn new(source: P, duration: Duration, scheduler: Sch) -> Self {
    Self { source, duration, scheduler }
  }
}

impl<P, Sch> Publisher for Debounce<P, Sch>
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
    self.source.subscribe(DebounceSubscriber {
      downstream,
      upstream,
      timers,
      state: MutArc::own(Pending { generation: 0, value: None }),
      duration: self.duration,
      scheduler: self.scheduler.clone(),
    });
  }
}

struct Pending<T> {
  /// Bumped for every upstream value; a timer only fires for its own value.
  generation: u64,
  value: Option<T>,
}

pub struct DebounceSubscriber<T, E, Sch> {
  downstream: Downstream<T, E>,
  upstream: SubscriptionSlot,
  timers: Timers,
  state: MutArc<Pending<T>>,
  duration: Duration,
  scheduler: Sch,
}

impl<T, E, Sch> Subscriber<T, E> for DebounceSubscriber<T, E, Sch>
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
    let generation = {
      let mut state = self.state.rc_deref_mut();
      state.generation += 1;
      state.value = Some(value);
      state.generation
    };
    self.timers.cancel_all();

    let state = self.state.clone();
    let downstream = self.downstream.clone();
    let handle = self.scheduler.schedule_after(self.duration, move || {
      let due = {
        let mut state = state.rc_deref_mut();
        if state.generation == generation { state.value.take() } else { None }
      };
      if let Some(value) = due {
        downstream.offer_latest(value);
      }
    });
    self.timers.track(handle);
    Demand::NONE
  }

  fn on_completion(&mut self, completion: Completion<E>) {
    self.upstream.release();
    self.timers.cancel_all();
    let pending = self.state.rc_deref_mut().value.take();
    match completion {
      Completion::Finished => {
        if let Some(value) = pending {
          self.downstream.offer_latest(value);
        }
        self.downstream.finish(Completion::Finished);
      }
      Completion::Failure(e) => self.downstream.finish(Completion::Failure(e)),
    }
  }
}
