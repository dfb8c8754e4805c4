use super::{subject_core::SubjectCore, Subject};
use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::BoxedSubscription,
};

/// A subject that relays values to its current subscribers and keeps none.
///
/// A subscriber with no outstanding demand misses the values sent meanwhile.
/// Clones share the same subscribers.
pub struct PassthroughSubject<T, E> {
  core: SubjectCore<T, E, ()>,
}

impl<T, E> Clone for PassthroughSubject<T, E> {
  fn clone(&self) -> Self { Self { core: self.core.clone() } }
}

impl<T, E> Default for PassthroughSubject<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  fn default() -> Self { Self::new() }
}

impl<T, E> PassthroughSubject<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  pub fn new() -> Self { Self { core: SubjectCore::new(()) } }

  /// Number of subscribers currently registered.
  pub fn subscriber_count(&self) -> usize { self.core.subscriber_count() }

  pub fn is_completed(&self) -> bool { self.core.is_completed() }
}

impl<T, E> Publisher for PassthroughSubject<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  type Output = T;
  type Failure = E;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T, E>,
  {
    self.core.subscribe(subscriber);
  }
}

impl<T, E> Subject for PassthroughSubject<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  fn send(&self, value: T) { self.core.send(value); }

  fn send_completion(&self, completion: Completion<E>) { self.core.send_completion(completion); }
}

impl<T, E> Subscriber<T, E> for PassthroughSubject<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.core.adopt(subscription); }

  fn on_value(&mut self, value: T) -> Demand {
    self.core.send(value);
    Demand::NONE
  }

  fn on_completion(&mut self, completion: Completion<E>) { self.core.send_completion(completion); }
}
