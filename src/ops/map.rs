//! Map operators: `map`, `try_map` and `compact_map`.

use std::sync::Arc;

use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::BoxedSubscription,
};

// ==================== Map ====================

/// Transforms each value with a closure.
pub struct Map<P, F> {
  pub source: P,
  pub func: Arc<F>,
}

impl<P: Clone, F> Clone for Map<P, F> {
  fn clone(&self) -> Self { Self { source: self.source.clone(), func: self.func.clone() } }
}

impl<P, F> Map<P, F> {
  pub fn new(source: P, func: F) -> Self { Self { source, func: Arc::new(func) } }
}

impl<P, F, U> Publisher for Map<P, F>
where
  P: Publisher,
  F: Fn(P::Output) -> U + Send + Sync + 'static,
  U: Send + 'static,
{
  type Output = U;
  type Failure = P::Failure;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<U, P::Failure>,
  {
    self
      .source
      .subscribe(MapSubscriber { downstream: subscriber, func: self.func.clone() });
  }
}

pub struct MapSubscriber<S, F> {
  downstream: S,
  func: Arc<F>,
}

impl<T, U, E, S, F> Subscriber<T, E> for MapSubscriber<S, F>
where
  S: Subscriber<U, E>,
  F: Fn(T) -> U + Send + Sync + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.downstream.on_subscribe(subscription)
  }

  fn on_value(&mut self, value: T) -> Demand { self.downstream.on_value((self.func)(value)) }

  fn on_completion(&mut self, completion: Completion<E>) {
    self.downstream.on_completion(completion)
  }
}

// ==================== TryMap ====================

/// Fallible [`Map`]: an `Err` from the closure terminates the stream.
pub struct TryMap<P, F> {
  pub source: P,
  pub func: Arc<F>,
}

impl<P, F> TryMap<P, F> {
  pub fn new(source: P, func: F) -> Self { Self { source, func: Arc::new(func) } }
}

impl<P, F, U> Publisher for TryMap<P, F>
where
  P: Publisher,
  F: Fn(P::Output) -> Result<U, P::Failure> + Send + Sync + 'static,
  U: Send + 'static,
{
  type Output = U;
  type Failure = P::Failure;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<U, P::Failure>,
  {
    self.source.subscribe(TryMapSubscriber {
      downstream: subscriber,
      func: self.func.clone(),
      upstream: None,
      done: false,
    });
  }
}

pub struct TryMapSubscriber<S, F> {
  downstream: S,
  func: Arc<F>,
  upstream: Option<BoxedSubscription>,
  done: bool,
}

impl<S, F> TryMapSubscriber<S, F> {
  /// Cancels the upstream after a closure failure; the caller delivers it.
  fn abort(&mut self) {
    self.done = true;
    if let Some(upstream) = self.upstream.take() {
      upstream.cancel();
    }
  }
}

impl<T, U, E, S, F> Subscriber<T, E> for TryMapSubscriber<S, F>
where
  S: Subscriber<U, E>,
  F: Fn(T) -> Result<U, E> + Send + Sync + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.upstream = Some(subscription.clone());
    self.downstream.on_subscribe(subscription)
  }

  fn on_value(&mut self, value: T) -> Demand {
    if self.done {
      return Demand::NONE;
    }
    match (self.func)(value) {
      Ok(value) => self.downstream.on_value(value),
      Err(e) => {
        self.abort();
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

// ==================== CompactMap ====================

/// Transforms values and drops the ones mapped to `None`.
pub struct CompactMap<P, F> {
  pub source: P,
  pub func: Arc<F>,
}

impl<P, F> CompactMap<P, F> {
  pub fn new(source: P, func: F) -> Self { Self { source, func: Arc::new(func) } }
}

impl<P, F, U> Publisher for CompactMap<P, F>
where
  P: Publisher,
  F: Fn(P::Output) -> Option<U> + Send + Sync + 'static,
  U: Send + 'static,
{
  type Output = U;
  type Failure = P::Failure;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<U, P::Failure>,
  {
    self
      .source
      .subscribe(CompactMapSubscriber { downstream: subscriber, func: self.func.clone() });
  }
}

pub struct CompactMapSubscriber<S, F> {
  downstream: S,
  func: Arc<F>,
}

impl<T, U, E, S, F> Subscriber<T, E> for CompactMapSubscriber<S, F>
where
  S: Subscriber<U, E>,
  F: Fn(T) -> Option<U> + Send + Sync + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.downstream.on_subscribe(subscription)
  }

  fn on_value(&mut self, value: T) -> Demand {
    match (self.func)(value) {
      Some(value) => self.downstream.on_value(value),
      None => Demand::max(1),
    }
  }

  fn on_completion(&mut self, completion: Completion<E>) {
    self.downstream.on_completion(completion)
  }
}

#[cfg(test)]
mod tests {
  use crate::{prelude::*, test_util::Recorder};

  #[rxcombine_macro::test]
  fn map_transforms_each_value() {
    let (recorder, record) = Recorder::<String, Never>::unlimited();
    Publishers::sequence(1..=3)
      .map(|v| format!("#{v}"))
      .subscribe(recorder);
    assert_eq!(record.values(), vec!["#1", "#2", "#3"]);
    assert_eq!(record.completion(), Some(Completion::Finished));
  }

  #[rxcombine_macro::test]
  fn try_map_failure_cancels_upstream() {
    let pulled = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let p = pulled.clone();
    let (recorder, record) = Recorder::<i32, String>::unlimited();
    Publishers::sequence(0..10)
      .map_error(|never: Never| -> String { match never {} })
      .handle_events(EventHooks::new().on_value(move |_| {
        p.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
      }))
      .try_map(|v| if v < 2 { Ok(v) } else { Err(format!("bad {v}")) })
      .subscribe(recorder);

    assert_eq!(record.values(), vec![0, 1]);
    assert_eq!(record.completion(), Some(Completion::Failure("bad 2".to_owned())));
    assert_eq!(record.completions(), 1);
    assert_eq!(pulled.load(std::sync::atomic::Ordering::SeqCst), 3);
  }

  #[rxcombine_macro::test]
  fn compact_map_refunds_dropped_values() {
    let (recorder, record) = Recorder::<i32, Never>::with_demand(Demand::max(2));
    Publishers::sequence(vec!["1", "x", "y", "2", "3"])
      .compact_map(|s| s.parse::<i32>().ok())
      .subscribe(recorder);
    assert_eq!(record.values(), vec![1, 2]);
    assert!(record.completion().is_none());
  }
}
