//! Filter operators.
//!
//! A value that fails the predicate was paid for with one unit of the
//! downstream's demand, so the subscriber gives that unit back to the
//! upstream. Without the refund a selective predicate would stall a bounded
//! subscriber forever.

use std::sync::Arc;

use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::BoxedSubscription,
};

/// Emits only the values matching a predicate.
pub struct Filter<P, F> {
  pub source: P,
  pub predicate: Arc<F>,
}

impl<P, F> Filter<P, F> {
  pub fn new(source: P, predicate: F) -> Self { Self { source, predicate: Arc::new(predicate) } }
}

impl<P, F> Publisher for Filter<P, F>
where
  P: Publisher,
  F: Fn(&P::Output) -> bool + Send + Sync + 'static,
{
  type Output = P::Output;
  type Failure = P::Failure;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Output, P::Failure>,
  {
    self
      .source
      .subscribe(FilterSubscriber { downstream: subscriber, predicate: self.predicate.clone() });
  }
}

pub struct FilterSubscriber<S, F> {
  downstream: S,
  predicate: Arc<F>,
}

impl<T, E, S, F> Subscriber<T, E> for FilterSubscriber<S, F>
where
  S: Subscriber<T, E>,
  F: Fn(&T) -> bool + Send + Sync + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.downstream.on_subscribe(subscription)
  }

  fn on_value(&mut self, value: T) -> Demand {
    if (self.predicate)(&value) { self.downstream.on_value(value) } else { Demand::max(1) }
  }

  fn on_completion(&mut self, completion: Completion<E>) {
    self.downstream.on_completion(completion)
  }
}

/// Fallible [`Filter`].
pub struct TryFilter<P, F> {
  pub source: P,
  pub predicate: Arc<F>,
}

impl<P, F> TryFilter<P, F> {
  pub fn new(source: P, predicate: F) -> Self { Self { source, predicate: Arc::new(predicate) } }
}

impl<P, F> Publisher for TryFilter<P, F>
where
  P: Publisher,
  F: Fn(&P::Output) -> Result<bool, P::Failure> + Send + Sync + 'static,
{
  type Output = P::Output;
  type Failure = P::Failure;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Output, P::Failure>,
  {
    self.source.subscribe(TryFilterSubscriber {
      downstream: subscriber,
      predicate: self.predicate.clone(),
      upstream: None,
      done: false,
    });
  }
}

pub struct TryFilterSubscriber<S, F> {
  downstream: S,
  predicate: Arc<F>,
  upstream: Option<BoxedSubscription>,
  done: bool,
}

impl<T, E, S, F> Subscriber<T, E> for TryFilterSubscriber<S, F>
where
  S: Subscriber<T, E>,
  F: Fn(&T) -> Result<bool, E> + Send + Sync + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.upstream = Some(subscription.clone());
    self.downstream.on_subscribe(subscription)
  }

  fn on_value(&mut self, value: T) -> Demand {
    if self.done {
      return Demand::NONE;
    }
    match (self.predicate)(&value) {
      Ok(true) => self.downstream.on_value(value),
      Ok(false) => Demand::max(1),
      Err(e) => {
        self.done = true;
        if let Some(upstream) = self.upstream.take() {
          upstream.cancel();
        }
        self.downstream.on_completion(Completion::Failure(e));
        Demand::NONE
      }
    }
  }

  fn on_completion(&mut self, completion: Completion<E>) {
    if !self.done {
      self.done = true;
      self.upstream = None;
      self.downstream.on_completion(completion)
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::{prelude::*, test_util::Recorder};

  #[rxcombine_macro::test]
  fn keeps_matching_values() {
    let (recorder, record) = Recorder::<i32, Never>::unlimited();
    Publishers::sequence(0..10)
      .filter(|v| v % 3 == 0)
      .subscribe(recorder);
    assert_eq!(record.values(), vec![0, 3, 6, 9]);
    assert_eq!(record.completion(), Some(Completion::Finished));
  }

  #[rxcombine_macro::test]
  fn dropped_values_do_not_spend_downstream_demand() {
    let (recorder, record) = Recorder::<i32, Never>::with_demand(Demand::max(3));
    Publishers::sequence(0..100)
      .filter(|v| v % 10 == 0)
      .subscribe(recorder);
    assert_eq!(record.values(), vec![0, 10, 20]);
  }

  #[rxcombine_macro::test]
  fn try_filter_error_terminates() {
    let (recorder, record) = Recorder::<i32, &str>::unlimited();
    Publishers::sequence(1..5)
      .map_error(|never: Never| -> &'static str { match never {} })
      .try_filter(|v| if *v == 3 { Err("three") } else { Ok(v % 2 == 1) })
      .subscribe(recorder);
    assert_eq!(record.values(), vec![1]);
    assert_eq!(record.completion(), Some(Completion::Failure("three")));
    assert_eq!(record.completions(), 1);
  }
}
