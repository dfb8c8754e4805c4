//! Merge operator implementation
//!
//! Interleaves the values of several publishers in arrival order. Downstream
//! demand is forwarded to every source and the surplus waits in the shared
//! [`Downstream`]. The merged stream finishes once every source finished; the
//! first failure cancels the remaining sources and is the only failure
//! delivered.

use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

use super::Relay;
use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, Downstream, SubscriptionSlot},
};

// ==================== Merge ====================

/// Merges two publishers of the same type.
#[derive(Clone)]
pub struct Merge<A, B> {
  pub source_a: A,
  pub source_b: B,
}

impl<A, B> Merge<A, B> {
  pub fn new(source_a: A, source_b: B) -> Self { Self { source_a, source_b } }
}

impl<A, B> Publisher for Merge<A, B>
where
  A: Publisher,
  B: Publisher<Output = A::Output, Failure = A::Failure>,
{
  type Output = A::Output;
  type Failure = A::Failure;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<A::Output, A::Failure>,
  {
    let merger = Merger::start(subscriber, 2);
    self.source_a.subscribe(merger.source(0));
    if !merger.downstream.is_terminated() {
      self.source_b.subscribe(merger.source(1));
    }
  }
}

// ==================== MergeMany ====================

/// Merges any number of publishers of one type, see
/// [`Publishers::merge_many`](crate::publisher::Publishers::merge_many).
#[derive(Clone)]
pub struct MergeMany<P> {
  pub sources: Vec<P>,
}

impl<P> MergeMany<P> {
  pub fn new<I: IntoIterator<Item = P>>(sources: I) -> Self {
    Self { sources: sources.into_iter().collect() }
  }
}

impl<P: Publisher> Publisher for MergeMany<P> {
  type Output = P::Output;
  type Failure = P::Failure;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Output, P::Failure>,
  {
    let merger = Merger::start(subscriber, self.sources.len());
    for (index, source) in self.sources.iter().enumerate() {
      if merger.downstream.is_terminated() {
        break;
      }
      source.subscribe(merger.source(index));
    }
  }
}

// ==================== Shared State ====================

struct Merger<T, E> {
  downstream: Downstream<T, E>,
  slots: Arc<[SubscriptionSlot]>,
  remaining: Arc<AtomicUsize>,
}

impl<T, E> Merger<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn start<S>(subscriber: S, sources: usize) -> Self
  where
    S: Subscriber<T, E>,
  {
    let downstream = Downstream::new(subscriber);
    let slots: Arc<[SubscriptionSlot]> = (0..sources).map(|_| SubscriptionSlot::default()).collect();
    if sources == 0 {
      downstream.finish(Completion::Finished);
    }
    Relay::new(downstream.clone(), slots.clone()).attach();
    Self { downstream, slots, remaining: Arc::new(AtomicUsize::new(sources)) }
  }

  fn source(&self, index: usize) -> MergeSource<T, E> {
    MergeSource {
      index,
      downstream: self.downstream.clone(),
      slots: self.slots.clone(),
      remaining: self.remaining.clone(),
    }
  }
}

/// Subscriber for one merged source.
pub struct MergeSource<T, E> {
  index: usize,
  downstream: Downstream<T, E>,
  slots: Arc<[SubscriptionSlot]>,
  remaining: Arc<AtomicUsize>,
}

impl<T, E> Subscriber<T, E> for MergeSource<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.slots[self.index].set(subscription);
  }

  fn on_value(&mut self, value: T) -> Demand {
    self.downstream.push(value);
    Demand::NONE
  }

  fn on_completion(&mut self, completion: Completion<E>) {
    self.slots[self.index].release();
    match completion {
      Completion::Finished => {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
          self.downstream.finish(Completion::Finished);
        }
      }
      Completion::Failure(e) => {
        tracing::trace!(source = self.index, "merge source failed, cancelling the others");
        for (index, slot) in self.slots.iter().enumerate() {
          if index != self.index {
            slot.cancel();
          }
        }
        self.downstream.finish(Completion::Failure(e));
      }
    }
  }
}
