use super::Relay;
use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Never, Subscriber},
  subscription::{BoxedSubscription, Downstream, SubscriptionSlot},
};

/// Turns a failure into one final value followed by a normal finish.
///
/// The replacement value waits for demand like any other value.
#[derive(Clone)]
pub struct ReplaceError<P: Publisher> {
  pub source: P,
  pub value: P::Output,
}

impl<P: Publisher> ReplaceError<P> {
  pub fn new(source: P, value: P::Output) -> Self { Self { source, value } }
}

impl<P> Publisher for ReplaceError<P>
where
  P: Publisher,
  P::Output: Clone + Sync,
{
  type Output = P::Output;
  type Failure = Never;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Output, Never>,
  {
    let downstream = Downstream::new(subscriber);
    let upstream = SubscriptionSlot::default();
    Relay::single(downstream.clone(), upstream.clone()).attach();
    self.source.subscribe(ReplaceErrorSubscriber {
      downstream,
      upstream,
      value: Some(self.value.clone()),
    });
  }
}

pub struct ReplaceErrorSubscriber<T> {
  downstream: Downstream<T, Never>,
  upstream: SubscriptionSlot,
  value: Option<T>,
}

impl<T, E> Subscriber<T, E> for ReplaceErrorSubscriber<T>
where
  T: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.upstream.set(subscription); }

  fn on_value(&mut self, value: T) -> Demand {
    self.downstream.push(value);
    Demand::NONE
  }

  fn on_completion(&mut self, completion: Completion<E>) {
    self.upstream.release();
    if completion.is_failure() {
      if let Some(value) = self.value.take() {
        self.downstream.push(value);
      }
    }
    self.downstream.finish(Completion::Finished);
  }
}
