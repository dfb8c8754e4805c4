use std::sync::Arc;

use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::BoxedSubscription,
};

/// Converts the failure type.
pub struct MapError<P, F> {
  pub source: P,
  pub func: Arc<F>,
}

impl<P, F> MapError<P, F> {
  pub fn new(source: P, func: F) -> Self { Self { source, func: Arc::new(func) } }
}

impl<P, F, E2> Publisher for MapError<P, F>
where
  P: Publisher,
  F: Fn(P::Failure) -> E2 + Send + Sync + 'static,
  E2: Send + 'static,
{
  type Output = P::Output;
  type Failure = E2;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Output, E2>,
  {
    self
      .source
      .subscribe(MapErrorSubscriber { downstream: subscriber, func: self.func.clone() });
  }
}

pub struct MapErrorSubscriber<S, F> {
  downstream: S,
  func: Arc<F>,
}

impl<T, E, E2, S, F> Subscriber<T, E> for MapErrorSubscriber<S, F>
where
  S: Subscriber<T, E2>,
  F: Fn(E) -> E2 + Send + Sync + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.downstream.on_subscribe(subscription)
  }

  fn on_value(&mut self, value: T) -> Demand { self.downstream.on_value(value) }

  fn on_completion(&mut self, completion: Completion<E>) {
    let func = &self.func;
    self.downstream.on_completion(completion.map_failure(|e| func(e)))
  }
}
