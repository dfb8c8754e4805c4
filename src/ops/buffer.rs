//! Buffer operators: collect values into fixed-size batches.
//!
//! The upstream is drained without limit into a queue of `size` values. A
//! full queue is emitted as one batch as soon as the downstream has demand;
//! until then further values are handled by the [`WhenFull`] policy.

use std::sync::Arc;

use crate::{
  demand::Demand,
  error::BufferError,
  publisher::Publisher,
  rc::MutArc,
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, Downstream, Subscription, SubscriptionSlot},
};

/// What a full buffer does with a value the downstream is not ready for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WhenFull {
  /// Evict the oldest buffered value.
  DropOldest,
  /// Discard the incoming value.
  #[default]
  DropNewest,
  /// Cancel the upstream and fail with [`BufferError::Overflow`].
  Fail,
}

// ==================== Buffer ====================

#[derive(Clone)]
pub struct Buffer<P> {
  pub source: P,
  pub size: usize,
  pub when_full: WhenFull,
}

impl<P> Buffer<P> {
  /// A `size` of zero is treated as one.
  pub fn new(source: P, size: usize, when_full: WhenFull) -> Self {
    Self { source, size: size.max(1), when_full }
  }
}

impl<P: Publisher> Publisher for Buffer<P> {
  type Output = Vec<P::Output>;
  type Failure = BufferError<P::Failure>;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Self::Output, Self::Failure>,
  {
    let shared = Batcher::start(subscriber, self.size, self.when_full);
    self.source.subscribe(BufferSubscriber(shared));
  }
}

// ==================== BufferWithFlush ====================

/// [`Buffer`] that additionally emits the collected values, full or not,
/// whenever `trigger` emits.
#[derive(Clone)]
pub struct BufferWithFlush<P, Q> {
  pub source: P,
  pub size: usize,
  pub when_full: WhenFull,
  pub trigger: Q,
}

impl<P, Q> BufferWithFlush<P, Q> {
  pub fn new(source: P, size: usize, when_full: WhenFull, trigger: Q) -> Self {
    Self { source, size: size.max(1), when_full, trigger }
  }
}

impl<P: Publisher, Q: Publisher> Publisher for BufferWithFlush<P, Q> {
  type Output = Vec<P::Output>;
  type Failure = BufferError<P::Failure>;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Self::Output, Self::Failure>,
  {
    let shared = Batcher::start(subscriber, self.size, self.when_full);
    self.trigger.subscribe(FlushTrigger(shared.clone()));
    if !shared.downstream.is_terminated() {
      self.source.subscribe(BufferSubscriber(shared));
    }
  }
}

// ==================== Shared State ====================

struct Batcher<T, E> {
  downstream: Downstream<Vec<T>, BufferError<E>>,
  upstream: SubscriptionSlot,
  trigger: SubscriptionSlot,
  batch: MutArc<Vec<T>>,
  size: usize,
  when_full: WhenFull,
}

impl<T, E> Batcher<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn start<S>(subscriber: S, size: usize, when_full: WhenFull) -> Arc<Self>
  where
    S: Subscriber<Vec<T>, BufferError<E>>,
  {
    let shared = Arc::new(Self {
      downstream: Downstream::new(subscriber),
      upstream: SubscriptionSlot::default(),
      trigger: SubscriptionSlot::default(),
      batch: MutArc::own(Vec::with_capacity(size)),
      size,
      when_full,
    });
    shared
      .downstream
      .attach(Arc::new(BatchSubscription(shared.clone())));
    shared
  }

  /// Emits the batch if it is full and the downstream can take it.
  fn emit_if_ready(&self) {
    {
      let mut batch = self.batch.rc_deref_mut();
      if batch.len() < self.size || !self.downstream.outstanding().covers(1) {
        return;
      }
      self.downstream.enqueue(std::mem::take(&mut *batch));
    }
    self.downstream.flush();
  }

  /// Returns `false` when the value overflowed a buffer that fails on
  /// overflow.
  fn add(&self, value: T) -> bool {
    let mut batch = self.batch.rc_deref_mut();
    if batch.len() < self.size {
      batch.push(value);
      return true;
    }
    tracing::debug!(capacity = self.size, policy = ?self.when_full, "buffer full");
    match self.when_full {
      WhenFull::DropOldest => {
        batch.remove(0);
        batch.push(value);
        true
      }
      WhenFull::DropNewest => true,
      WhenFull::Fail => false,
    }
  }

  fn flush_partial(&self) {
    {
      let mut batch = self.batch.rc_deref_mut();
      if !batch.is_empty() {
        self.downstream.enqueue(std::mem::take(&mut *batch));
      }
    }
    self.downstream.flush();
  }

  fn terminate(&self, completion: Completion<BufferError<E>>) {
    self.trigger.cancel();
    match completion {
      Completion::Finished => {
        {
          let mut batch = self.batch.rc_deref_mut();
          if !batch.is_empty() {
            self.downstream.enqueue(std::mem::take(&mut *batch));
          }
          self.downstream.enqueue_completion(Completion::Finished);
        }
        self.downstream.flush();
      }
      failure => {
        self.batch.rc_deref_mut().clear();
        self.downstream.finish(failure);
      }
    }
  }
}

struct BatchSubscription<T, E>(Arc<Batcher<T, E>>);

impl<T, E> Subscription for BatchSubscription<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn request(&self, demand: Demand) {
    self.0.downstream.add_demand(demand);
    self.0.emit_if_ready();
  }

  fn cancel(&self) {
    self.0.upstream.cancel();
    self.0.trigger.cancel();
    self.0.downstream.cancel();
  }
}

// ==================== Subscribers ====================

pub struct BufferSubscriber<T, E>(Arc<Batcher<T, E>>);

impl<T, E> Subscriber<T, E> for BufferSubscriber<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.0.upstream.set(subscription);
    self.0.upstream.request(Demand::Unlimited);
  }

  fn on_value(&mut self, value: T) -> Demand {
    if self.0.add(value) {
      self.0.emit_if_ready();
    } else {
      self.0.upstream.cancel();
      self
        .0
        .terminate(Completion::Failure(BufferError::Overflow { capacity: self.0.size }));
    }
    Demand::NONE
  }

  fn on_completion(&mut self, completion: Completion<E>) {
    self.0.upstream.release();
    self.0.terminate(completion.map_failure(BufferError::Upstream));
  }
}

pub struct FlushTrigger<T, E>(Arc<Batcher<T, E>>);

impl<T, E, U, G> Subscriber<U, G> for FlushTrigger<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.0.trigger.set(subscription);
    self.0.trigger.request(Demand::Unlimited);
  }

  fn on_value(&mut self, _value: U) -> Demand {
    self.0.flush_partial();
    Demand::NONE
  }

  fn on_completion(&mut self, _completion: Completion<G>) { self.0.trigger.release(); }
}
