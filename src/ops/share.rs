//! Share operator implementation
//!
//! `share()` multicasts one upstream subscription through a
//! [`PassthroughSubject`]. The first subscriber connects to the upstream, the
//! last one to cancel disconnects it, and when the upstream terminates the
//! connection is forgotten so that the next subscriber starts a fresh one.

use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc,
};

use crate::{
  demand::Demand,
  publisher::Publisher,
  rc::MutArc,
  subject::{PassthroughSubject, Subject},
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, Subscription, SubscriptionSlot},
};

struct Connection<T, E> {
  id: usize,
  subject: PassthroughSubject<T, E>,
  upstream: SubscriptionSlot,
  refs: usize,
}

struct ShareState<T, E> {
  connection: Option<Connection<T, E>>,
  next_id: usize,
}

/// Reference-counted multicast of one upstream, see
/// [`PublisherExt::share`](crate::publisher::PublisherExt::share).
pub struct Share<P: Publisher> {
  source: Arc<P>,
  state: MutArc<ShareState<P::Output, P::Failure>>,
}

impl<P: Publisher> Clone for Share<P> {
  fn clone(&self) -> Self { Self { source: self.source.clone(), state: self.state.clone() } }
}

impl<P: Publisher> Share<P> {
  pub fn new(source: P) -> Self {
    Self {
      source: Arc::new(source),
      state: MutArc::own(ShareState { connection: None, next_id: 0 }),
    }
  }
}

impl<P> Publisher for Share<P>
where
  P: Publisher,
  P::Output: Clone,
  P::Failure: Clone,
{
  type Output = P::Output;
  type Failure = P::Failure;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Output, P::Failure>,
  {
    let (id, subject, connect) = {
      let mut state = self.state.rc_deref_mut();
      let connect = state.connection.is_none();
      if connect {
        let id = state.next_id;
        state.next_id += 1;
        state.connection = Some(Connection {
          id,
          subject: PassthroughSubject::new(),
          upstream: SubscriptionSlot::default(),
          refs: 0,
        });
      }
      let Some(connection) = state.connection.as_mut() else {
        return;
      };
      connection.refs += 1;
      let upstream = connect.then(|| connection.upstream.clone());
      (connection.id, connection.subject.clone(), upstream)
    };

    let lease = Arc::new(Lease { state: self.state.clone(), id, released: AtomicBool::new(false) });
    subject.subscribe(ShareSubscriber { inner: subscriber, lease });

    if let Some(upstream) = connect {
      tracing::trace!(id, "share connecting");
      self.source.subscribe(Connector { subject, upstream, state: self.state.clone(), id });
    }
  }
}

/// One subscriber's hold on a connection.
struct Lease<T, E> {
  state: MutArc<ShareState<T, E>>,
  id: usize,
  released: AtomicBool,
}

impl<T, E> Lease<T, E> {
  fn release(&self) {
    if self.released.swap(true, Ordering::AcqRel) {
      return;
    }
    let disconnected = {
      let mut state = self.state.rc_deref_mut();
      match state.connection.as_mut() {
        Some(connection) if connection.id == self.id => {
          connection.refs -= 1;
          if connection.refs == 0 { state.connection.take() } else { None }
        }
        _ => None,
      }
    };
    if let Some(connection) = disconnected {
      tracing::trace!(id = self.id, "share disconnecting");
      connection.upstream.cancel();
    }
  }
}

struct ShareSubscription<T, E> {
  inner: BoxedSubscription,
  lease: Arc<Lease<T, E>>,
}

impl<T, E> Subscription for ShareSubscription<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn request(&self, demand: Demand) { self.inner.request(demand); }

  fn cancel(&self) {
    self.inner.cancel();
    self.lease.release();
  }
}

pub struct ShareSubscriber<S, T, E> {
  inner: S,
  lease: Arc<Lease<T, E>>,
}

impl<S, T, E> Subscriber<T, E> for ShareSubscriber<S, T, E>
where
  S: Subscriber<T, E>,
  T: Send + 'static,
  E: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    let lease = self.lease.clone();
    self
      .inner
      .on_subscribe(Arc::new(ShareSubscription { inner: subscription, lease }));
  }

  fn on_value(&mut self, value: T) -> Demand { self.inner.on_value(value) }

  fn on_completion(&mut self, completion: Completion<E>) { self.inner.on_completion(completion) }
}

/// The single subscriber attached to the upstream.
pub struct Connector<T, E> {
  subject: PassthroughSubject<T, E>,
  upstream: SubscriptionSlot,
  state: MutArc<ShareState<T, E>>,
  id: usize,
}

impl<T, E> Subscriber<T, E> for Connector<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.upstream.set(subscription);
    self.upstream.request(Demand::unlimited());
  }

  fn on_value(&mut self, value: T) -> Demand {
    self.subject.send(value);
    Demand::NONE
  }

  fn on_completion(&mut self, completion: Completion<E>) {
    self.upstream.release();
    let finished = {
      let mut state = self.state.rc_deref_mut();
      match &state.connection {
        Some(connection) if connection.id == self.id => state.connection.take(),
        _ => None,
      }
    };
    drop(finished);
    self.subject.send_completion(completion);
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use crate::{
    prelude::*,
    test_util::{Event, Recorder},
  };

  #[rxcombine_macro::test]
  fn one_upstream_subscription_for_all_subscribers() {
    let source = PassthroughSubject::<i32, Never>::new();
    let shared = source.clone().map(|v| v * 10).share();
    let (a, record_a) = Recorder::<i32, Never>::unlimited();
    let (b, record_b) = Recorder::<i32, Never>::unlimited();
    shared.subscribe(a);
    shared.subscribe(b);
    assert_eq!(source.subscriber_count(), 1);

    source.send(1);
    source.send(2);
    assert_eq!(record_a.values(), vec![10, 20]);
    assert_eq!(record_b.values(), vec![10, 20]);
  }

  #[rxcombine_macro::test]
  fn last_cancel_disconnects_and_next_subscriber_reconnects() {
    let source = PassthroughSubject::<i32, Never>::new();
    let shared = source.clone().share();
    let (a, record_a) = Recorder::<i32, Never>::unlimited();
    let (b, record_b) = Recorder::<i32, Never>::unlimited();
    shared.subscribe(a);
    shared.subscribe(b);

    record_a.cancel();
    assert_eq!(source.subscriber_count(), 1);
    record_b.cancel();
    assert_eq!(source.subscriber_count(), 0);

    let (c, record_c) = Recorder::<i32, Never>::unlimited();
    shared.subscribe(c);
    assert_eq!(source.subscriber_count(), 1);
    source.send(3);
    assert_eq!(record_c.values(), vec![3]);
    assert!(record_a.values().is_empty());
  }

  #[rxcombine_macro::test]
  fn completion_resets_the_connection() {
    let subscriptions = Arc::new(AtomicUsize::new(0));
    let counter = subscriptions.clone();
    let shared = Publishers::deferred(move || {
      counter.fetch_add(1, Ordering::SeqCst);
      Publishers::sequence(vec![1, 2])
    })
    .share();

    for _ in 0..2 {
      let (recorder, record) = Recorder::<i32, Never>::unlimited();
      shared.subscribe(recorder);
      assert_eq!(
        record.events(),
        vec![Event::Value(1), Event::Value(2), Event::Completion(Completion::Finished)]
      );
    }
    assert_eq!(subscriptions.load(Ordering::SeqCst), 2);
  }

  #[rxcombine_macro::test]
  fn failure_reaches_every_subscriber() {
    let source = PassthroughSubject::<i32, &str>::new();
    let shared = source.clone().share();
    let (a, record_a) = Recorder::<i32, &str>::unlimited();
    let (b, record_b) = Recorder::<i32, &str>::unlimited();
    shared.subscribe(a);
    shared.subscribe(b);
    source.send_completion(Completion::Failure("boom"));
    assert_eq!(record_a.completion(), Some(Completion::Failure("boom")));
    assert_eq!(record_b.completion(), Some(Completion::Failure("boom")));
  }
}
