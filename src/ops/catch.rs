//! Catch operator implementation
//!
//! On failure the upstream is replaced by the publisher the handler builds
//! from the failure. Values already delivered stay delivered, and demand the
//! downstream requested but did not receive carries over to the replacement.

use std::sync::Arc;

use super::Relay;
use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, Downstream, SubscriptionSlot},
};

pub struct Catch<P, F> {
  pub source: P,
  pub handler: Arc<F>,
}

impl<P: Clone, F> Clone for Catch<P, F> {
  fn clone(&self) -> Self { Self { source: self.source.clone(), handler: self.handler.clone() } }
}

impl<P, F> Catch<P, F> {
  pub fn new(source: P, handler: F) -> Self { Self { source, handler: Arc::new(handler) } }
}

impl<P, Q, F> Publisher for Catch<P, F>
where
  P: Publisher,
  Q: Publisher<Output = P::Output>,
  F: Fn(P::Failure) -> Q + Send + Sync + 'static,
{
  type Output = P::Output;
  type Failure = Q::Failure;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Output, Q::Failure>,
  {
    let downstream = Downstream::new(subscriber);
    let upstream = SubscriptionSlot::default();
    Relay::single(downstream.clone(), upstream.clone()).attach();
    self.source.subscribe(CatchSubscriber {
      forward: Forward { downstream, upstream },
      handler: self.handler.clone(),
    });
  }
}

/// Forwards one upstream into a shared downstream.
struct Forward<T, E> {
  downstream: Downstream<T, E>,
  upstream: SubscriptionSlot,
}

pub struct CatchSubscriber<T, E, F> {
  forward: Forward<T, E>,
  handler: Arc<F>,
}

impl<T, E, E0, Q, F> Subscriber<T, E0> for CatchSubscriber<T, E, F>
where
  T: Send + 'static,
  E: Send + 'static,
  Q: Publisher<Output = T, Failure = E>,
  F: Fn(E0) -> Q + Send + Sync + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.forward.upstream.set(subscription);
  }

  fn on_value(&mut self, value: T) -> Demand {
    self.forward.downstream.push(value);
    Demand::NONE
  }

  fn on_completion(&mut self, completion: Completion<E0>) {
    match completion {
      Completion::Finished => {
        self.forward.upstream.release();
        self.forward.downstream.finish(Completion::Finished);
      }
      Completion::Failure(e) => {
        let Forward { downstream, upstream } = &self.forward;
        if !upstream.reopen(downstream.outstanding()) {
          return;
        }
        tracing::debug!("upstream failed, switching to the replacement publisher");
        let replacement = (self.handler)(e);
        replacement.subscribe(Forward { downstream: downstream.clone(), upstream: upstream.clone() });
      }
    }
  }
}

impl<T, E> Subscriber<T, E> for Forward<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.upstream.set(subscription); }

  fn on_value(&mut self, value: T) -> Demand {
    self.downstream.push(value);
    Demand::NONE
  }

  fn on_completion(&mut self, completion: Completion<E>) {
    self.upstream.release();
    self.downstream.finish(completion);
  }
}

#[cfg(test)]
mod tests {
  use crate::{
    prelude::*,
    test_util::{Event, Recorder},
  };

  #[rxcombine_macro::test]
  fn switches_to_the_replacement() {
    let subject = PassthroughSubject::<i32, &str>::new();
    let (recorder, record) = Recorder::<i32, Never>::unlimited();
    subject
      .clone()
      .catch(|_| Publishers::sequence(vec![-1, -2]))
      .subscribe(recorder);
    subject.send(1);
    subject.send_completion(Completion::Failure("boom"));
    assert_eq!(
      record.events(),
      vec![
        Event::Value(1),
        Event::Value(-1),
        Event::Value(-2),
        Event::Completion(Completion::Finished)
      ]
    );
  }

  #[rxcombine_macro::test]
  fn unmet_demand_carries_over() {
    let (recorder, record) = Recorder::<i32, Never>::with_demand(Demand::max(2));
    Publishers::fail::<i32, &str>("boom")
      .catch(|_| Publishers::sequence(0..10))
      .subscribe(recorder);
    assert_eq!(record.values(), vec![0, 1]);
    record.request(Demand::max(1));
    assert_eq!(record.values(), vec![0, 1, 2]);
  }

  #[rxcombine_macro::test]
  fn replacement_failure_is_delivered() {
    let (recorder, record) = Recorder::<i32, String>::unlimited();
    Publishers::fail::<i32, &str>("first")
      .catch(|e| Publishers::fail::<i32, String>(format!("{e} then second")))
      .subscribe(recorder);
    assert_eq!(record.completion(), Some(Completion::Failure("first then second".to_string())));
  }
}
