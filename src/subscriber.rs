//! Subscriber trait and implementations
//!
//! A [`Subscriber`] is the consumer side of a pipeline. It is handed a
//! subscription once, receives values only while it has outstanding demand, and
//! gets exactly one terminal [`Completion`] unless the subscription is
//! cancelled first.

use std::convert::Infallible;

use crate::{
  demand::Demand,
  subscription::{BoxedSubscription, Cancellable, SubscriptionSlot},
};

/// Marker failure type for pipelines that cannot fail.
pub type Never = Infallible;

// ============================================================================
// Completion
// ============================================================================

/// Terminal event of a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Completion<E> {
  /// The publisher finished normally.
  Finished,
  /// The publisher failed; no further values follow.
  Failure(E),
}

impl<E> Completion<E> {
  #[inline]
  pub fn is_finished(&self) -> bool { matches!(self, Completion::Finished) }

  #[inline]
  pub fn is_failure(&self) -> bool { matches!(self, Completion::Failure(_)) }

  pub fn map_failure<F, G>(self, f: F) -> Completion<G>
  where
    F: FnOnce(E) -> G,
  {
    match self {
      Completion::Finished => Completion::Finished,
      Completion::Failure(e) => Completion::Failure(f(e)),
    }
  }

  pub fn failure(self) -> Option<E> {
    match self {
      Completion::Finished => None,
      Completion::Failure(e) => Some(e),
    }
  }

  pub fn as_ref(&self) -> Completion<&E> {
    match self {
      Completion::Finished => Completion::Finished,
      Completion::Failure(e) => Completion::Failure(e),
    }
  }
}

impl<E> From<Completion<E>> for Result<(), E> {
  fn from(completion: Completion<E>) -> Self {
    match completion {
      Completion::Finished => Ok(()),
      Completion::Failure(e) => Err(e),
    }
  }
}

impl Completion<Never> {
  /// Widens an infallible completion to any failure type.
  pub fn promote<E>(self) -> Completion<E> { Completion::Finished }
}

// ============================================================================
// Subscriber Trait
// ============================================================================

/// The consumer of a publisher.
///
/// For one subscription the three callbacks are never invoked concurrently,
/// `on_subscribe` is always first, and nothing follows `on_completion`.
pub trait Subscriber<Input, Failure>: Send + 'static {
  /// Receives the live subscription. Call
  /// [`request`](crate::subscription::Subscription::request) on it to start the
  /// flow of values.
  fn on_subscribe(&mut self, subscription: BoxedSubscription);

  /// Receives one value and returns the demand to *add* to what is left.
  fn on_value(&mut self, value: Input) -> Demand;

  /// Receives the terminal event.
  fn on_completion(&mut self, completion: Completion<Failure>);
}

/// Type-erased subscriber.
pub type BoxedSubscriber<Input, Failure> = Box<dyn Subscriber<Input, Failure>>;

impl<Input, Failure> Subscriber<Input, Failure> for BoxedSubscriber<Input, Failure>
where
  Input: 'static,
  Failure: 'static,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    (**self).on_subscribe(subscription)
  }

  #[inline]
  fn on_value(&mut self, value: Input) -> Demand { (**self).on_value(value) }

  #[inline]
  fn on_completion(&mut self, completion: Completion<Failure>) {
    (**self).on_completion(completion)
  }
}

// ============================================================================
// Sink - Closure subscriber
// ============================================================================

/// Closure-backed subscriber created by
/// [`PublisherExt::sink`](crate::publisher::PublisherExt::sink) and friends.
///
/// A sink requests unlimited demand as soon as it is subscribed and hands its
/// subscription to the [`Cancellable`] returned to the caller.
pub struct Sink<N, C> {
  on_value: N,
  on_completion: Option<C>,
  slot: SubscriptionSlot,
}

impl<N, C> Sink<N, C> {
  /// Builds the sink and the token that owns its subscription.
  pub fn new(on_value: N, on_completion: C) -> (Self, Cancellable) {
    let slot = SubscriptionSlot::default();
    let token = Cancellable::new(slot.clone());
    (Sink { on_value, on_completion: Some(on_completion), slot }, token)
  }
}

impl<Input, Failure, N, C> Subscriber<Input, Failure> for Sink<N, C>
where
  N: FnMut(Input) + Send + 'static,
  C: FnOnce(Completion<Failure>) + Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.slot.set(subscription);
    self.slot.request(Demand::Unlimited);
  }

  fn on_value(&mut self, value: Input) -> Demand {
    (self.on_value)(value);
    Demand::NONE
  }

  fn on_completion(&mut self, completion: Completion<Failure>) {
    self.slot.release();
    if let Some(on_completion) = self.on_completion.take() {
      on_completion(completion);
    }
  }
}
