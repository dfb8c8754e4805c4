//! Scan operators: a running fold whose accumulator belongs to one
//! subscription.

use std::sync::Arc;

use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::BoxedSubscription,
};

/// Emits every intermediate accumulator value.
pub struct Scan<P, A, F> {
  pub source: P,
  pub initial: A,
  pub func: Arc<F>,
}

impl<P, A, F> Scan<P, A, F> {
  pub fn new(source: P, initial: A, func: F) -> Self {
    Self { source, initial, func: Arc::new(func) }
  }
}

impl<P, A, F> Publisher for Scan<P, A, F>
where
  P: Publisher,
  A: Clone + Send + Sync + 'static,
  F: Fn(A, P::Output) -> A + Send + Sync + 'static,
{
  type Output = A;
  type Failure = P::Failure;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<A, P::Failure>,
  {
    self.source.subscribe(ScanSubscriber {
      downstream: subscriber,
      acc: Some(self.initial.clone()),
      func: self.func.clone(),
    });
  }
}

pub struct ScanSubscriber<S, A, F> {
  downstream: S,
  acc: Option<A>,
  func: Arc<F>,
}

impl<T, E, S, A, F> Subscriber<T, E> for ScanSubscriber<S, A, F>
where
  S: Subscriber<A, E>,
  A: Clone + Send + 'static,
  F: Fn(A, T) -> A + Send + Sync + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.downstream.on_subscribe(subscription)
  }

  fn on_value(&mut self, value: T) -> Demand {
    let Some(acc) = self.acc.take() else { return Demand::NONE };
    let acc = (self.func)(acc, value);
    self.acc = Some(acc.clone());
    self.downstream.on_value(acc)
  }

  fn on_completion(&mut self, completion: Completion<E>) {
    self.downstream.on_completion(completion)
  }
}

/// Fallible [`Scan`].
pub struct TryScan<P, A, F> {
  pub source: P,
  pub initial: A,
  pub func: Arc<F>,
}

impl<P, A, F> TryScan<P, A, F> {
  pub fn new(source: P, initial: A, func: F) -> Self {
    Self { source, initial, func: Arc::new(func) }
  }
}

impl<P, A, F> Publisher for TryScan<P, A, F>
where
  P: Publisher,
  A: Clone + Send + Sync + 'static,
  F: Fn(A, P::Output) -> Result<A, P::Failure> + Send + Sync + 'static,
{
  type Output = A;
  type Failure = P::Failure;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<A, P::Failure>,
  {
    self.source.subscribe(TryScanSubscriber {
      downstream: subscriber,
      acc: Some(self.initial.clone()),
      func: self.func.clone(),
      upstream: None,
    });
  }
}

pub struct TryScanSubscriber<S, A, F> {
  downstream: S,
  /// `None` once a failure was delivered.
  acc: Option<A>,
  func: Arc<F>,
  upstream: Option<BoxedSubscription>,
}

impl<T, E, S, A, F> Subscriber<T, E> for TryScanSubscriber<S, A, F>
where
  S: Subscriber<A, E>,
  A: Clone + Send + 'static,
  F: Fn(A, T) -> Result<A, E> + Send + Sync + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.upstream = Some(subscription.clone());
    self.downstream.on_subscribe(subscription)
  }

  fn on_value(&mut self, value: T) -> Demand {
    let Some(acc) = self.acc.take() else { return Demand::NONE };
    match (self.func)(acc, value) {
      Ok(acc) => {
        self.acc = Some(acc.clone());
        self.downstream.on_value(acc)
      }
      Err(e) => {
        if let Some(upstream) = self.upstream.take() {
          upstream.cancel();
        }
        self.downstream.on_completion(Completion::Failure(e));
        Demand::NONE
      }
    }
  }

  fn on_completion(&mut self, completion: Completion<E>) {
    if self.acc.take().is_some() {
      self.upstream = None;
      self.downstream.on_completion(completion)
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::{prelude::*, test_util::Recorder};

  #[rxcombine_macro::test]
  fn emits_running_totals() {
    let (recorder, record) = Recorder::<i32, Never>::unlimited();
    Publishers::sequence(1..=4)
      .scan(0, |acc, v| acc + v)
      .subscribe(recorder);
    assert_eq!(record.values(), vec![1, 3, 6, 10]);
  }

  #[rxcombine_macro::test]
  fn accumulator_is_per_subscription() {
    let source = Publishers::sequence(vec![1, 1, 1]).scan(10, |acc, v| acc + v);
    let (first, first_record) = Recorder::<i32, Never>::unlimited();
    let (second, second_record) = Recorder::<i32, Never>::unlimited();
    source.subscribe(first);
    source.subscribe(second);
    assert_eq!(first_record.values(), vec![11, 12, 13]);
    assert_eq!(second_record.values(), vec![11, 12, 13]);
  }

  #[rxcombine_macro::test]
  fn try_scan_stops_at_the_first_error() {
    let (recorder, record) = Recorder::<u8, &str>::unlimited();
    Publishers::sequence(vec![100u8, 100, 100])
      .map_error(|never: Never| -> &'static str { match never {} })
      .try_scan(0u8, |acc, v| acc.checked_add(v).ok_or("overflow"))
      .subscribe(recorder);
    assert_eq!(record.values(), vec![100, 200]);
    assert_eq!(record.completion(), Some(Completion::Failure("overflow")));
    assert_eq!(record.completions(), 1);
  }
}
