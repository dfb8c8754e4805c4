use super::Publisher;
use crate::{
  subscriber::{Completion, Subscriber},
  subscription::Downstream,
  type_hint::TypeHint,
};

/// Finishes without emitting.
pub struct Empty<T, E>(TypeHint<(T, E)>);

impl<T, E> Empty<T, E> {
  pub fn new() -> Self { Self(TypeHint::new()) }
}

impl<T, E> Default for Empty<T, E> {
  fn default() -> Self { Self::new() }
}

impl<T, E> Clone for Empty<T, E> {
  fn clone(&self) -> Self { Self::new() }
}

impl<T, E> Publisher for Empty<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  type Output = T;
  type Failure = E;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T, E>,
  {
    let downstream = Downstream::new(subscriber);
    downstream.finish(Completion::Finished);
    downstream.attach_self();
  }
}

/// Fails right after `on_subscribe`, whether or not demand was requested.
#[derive(Clone)]
pub struct Fail<T, E> {
  error: E,
  _hint: TypeHint<T>,
}

impl<T, E> Fail<T, E> {
  pub fn new(error: E) -> Self { Self { error, _hint: TypeHint::new() } }
}

impl<T, E> Publisher for Fail<T, E>
where
  T: Send + 'static,
  E: Clone + Send + Sync + 'static,
{
  type Output = T;
  type Failure = E;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T, E>,
  {
    let downstream = Downstream::new(subscriber);
    downstream.finish(Completion::Failure(self.error.clone()));
    downstream.attach_self();
  }
}

/// Never emits and never terminates; only cancellation ends it.
pub struct NeverPublisher<T, E>(TypeHint<(T, E)>);

impl<T, E> NeverPublisher<T, E> {
  pub fn new() -> Self { Self(TypeHint::new()) }
}

impl<T, E> Default for NeverPublisher<T, E> {
  fn default() -> Self { Self::new() }
}

impl<T, E> Clone for NeverPublisher<T, E> {
  fn clone(&self) -> Self { Self::new() }
}

impl<T, E> Publisher for NeverPublisher<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  type Output = T;
  type Failure = E;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T, E>,
  {
    Downstream::new(subscriber).attach_self();
  }
}
