//! Lifecycle hooks that observe a stream without changing it.

use std::sync::Arc;

use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, Subscription},
};

type Hook<A> = Option<Box<dyn Fn(A) + Send + Sync>>;

/// Callbacks for [`handle_events`](crate::publisher::PublisherExt::handle_events).
///
/// ```rust
/// use rxcombine::prelude::*;
///
/// let _token = Publishers::just(1)
///   .handle_events(
///     EventHooks::new()
///       .on_subscribe(|| println!("subscribed"))
///       .on_value(|v| println!("value {v}"))
///       .on_request(|d| println!("demand {d}")),
///   )
///   .sink(|_| {});
/// ```
pub struct EventHooks<T, E> {
  subscribe: Hook<()>,
  value: Option<Box<dyn Fn(&T) + Send + Sync>>,
  completion: Option<Box<dyn Fn(&Completion<E>) + Send + Sync>>,
  cancel: Hook<()>,
  request: Hook<Demand>,
}

impl<T, E> Default for EventHooks<T, E> {
  fn default() -> Self {
    Self { subscribe: None, value: None, completion: None, cancel: None, request: None }
  }
}

impl<T, E> EventHooks<T, E> {
  pub fn new() -> Self { Self::default() }

  pub fn on_subscribe(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
    self.subscribe = Some(Box::new(move |()| f()));
    self
  }

  pub fn on_value(mut self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
    self.value = Some(Box::new(f));
    self
  }

  pub fn on_completion(mut self, f: impl Fn(&Completion<E>) + Send + Sync + 'static) -> Self {
    self.completion = Some(Box::new(f));
    self
  }

  /// Called when the downstream cancels, before the cancel travels upstream.
  pub fn on_cancel(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
    self.cancel = Some(Box::new(move |()| f()));
    self
  }

  pub fn on_request(mut self, f: impl Fn(Demand) + Send + Sync + 'static) -> Self {
    self.request = Some(Box::new(f));
    self
  }
}

pub struct HandleEvents<P: Publisher> {
  pub source: P,
  hooks: Arc<EventHooks<P::Output, P::Failure>>,
}

impl<P: Publisher> HandleEvents<P> {
  pub fn new(source: P, hooks: EventHooks<P::Output, P::Failure>) -> Self {
    Self { source, hooks: Arc::new(hooks) }
  }
}

impl<P: Publisher> Publisher for HandleEvents<P> {
  type Output = P::Output;
  type Failure = P::Failure;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Output, P::Failure>,
  {
    self
      .source
      .subscribe(HandleEventsSubscriber { downstream: subscriber, hooks: self.hooks.clone() });
  }
}

struct HandleEventsSubscriber<S, T, E> {
  downstream: S,
  hooks: Arc<EventHooks<T, E>>,
}

impl<S, T, E> Subscriber<T, E> for HandleEventsSubscriber<S, T, E>
where
  S: Subscriber<T, E>,
  T: Send + 'static,
  E: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    if let Some(hook) = &self.hooks.subscribe {
      hook(());
    }
    let hooked = HookedSubscription { upstream: subscription, hooks: self.hooks.clone() };
    self.downstream.on_subscribe(Arc::new(hooked))
  }

  fn on_value(&mut self, value: T) -> Demand {
    if let Some(hook) = &self.hooks.value {
      hook(&value);
    }
    self.downstream.on_value(value)
  }

  fn on_completion(&mut self, completion: Completion<E>) {
    if let Some(hook) = &self.hooks.completion {
      hook(&completion);
    }
    self.downstream.on_completion(completion)
  }
}

struct HookedSubscription<T, E> {
  upstream: BoxedSubscription,
  hooks: Arc<EventHooks<T, E>>,
}

impl<T, E> Subscription for HookedSubscription<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn request(&self, demand: Demand) {
    if let Some(hook) = &self.hooks.request {
      hook(demand);
    }
    self.upstream.request(demand)
  }

  fn cancel(&self) {
    if let Some(hook) = &self.hooks.cancel {
      hook(());
    }
    self.upstream.cancel()
  }
}
