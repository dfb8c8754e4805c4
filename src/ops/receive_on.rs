use super::{Relay, Timers};
use crate::{
  demand::Demand,
  publisher::Publisher,
  scheduler::Scheduler,
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, Downstream, SubscriptionSlot},
};

/// Delivers values and the terminal event through `scheduler`.
///
/// With a serial scheduler such as
/// [`QueueScheduler`](crate::scheduler::QueueScheduler) the order of events
/// is preserved. Cancelling drops the hops that have not run yet.
#[derive(Clone)]
pub struct ReceiveOn<P, Sch> {
  pub source: P,
  pub scheduler: Sch,
}

impl<P, Sch> ReceiveOn<P, Sch> {
  pub fn new(source: P, scheduler: Sch) -> Self { Self { source, scheduler } }
}

impl<P, Sch> Publisher for ReceiveOn<P, Sch>
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
    self.source.subscribe(ReceiveOnSubscriber {
      downstream,
      upstream,
      timers,
      scheduler: self.scheduler.clone(),
    });
  }
}

pub struct ReceiveOnSubscriber<T, E, Sch> {
  downstream: Downstream<T, E>,
  upstream: SubscriptionSlot,
  timers: Timers,
  scheduler: Sch,
}

impl<T, E, Sch> Subscriber<T, E> for ReceiveOnSubscriber<T, E, Sch>
where
  T: Send + 'static,
  E: Send + 'static,
  Sch: Scheduler,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.upstream.set(subscription); }

  fn on_value(&mut self, value: T) -> Demand {
    let downstream = self.downstream.clone();
    self.timers.track(self.scheduler.schedule(move || downstream.push(value)));
    Demand::NONE
  }

  fn on_completion(&mut self, completion: Completion<E>) {
    self.upstream.release();
    let downstream = self.downstream.clone();
    self
      .timers
      .track(self.scheduler.schedule(move || downstream.finish(completion)));
  }
}
