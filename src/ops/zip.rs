//! Zip operator implementation
//!
//! Zip combines items from two publishers pairwise, emitting a tuple when
//! both sources have an unconsumed value.

use std::{collections::VecDeque, sync::Arc};

use super::Relay;
use crate::{
  demand::Demand,
  publisher::Publisher,
  rc::MutArc,
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, Downstream, SubscriptionSlot},
};

// ==================== Zip Operator ====================

/// Zip operator
///
/// Buffers the values of each source and emits `(a, b)` once both buffers
/// hold a value, consuming one from each. Completes as soon as a finished
/// source has an empty buffer, since no further pair can be formed.
#[derive(Clone)]
pub struct Zip<A, B> {
  pub source_a: A,
  pub source_b: B,
}

impl<A, B> Zip<A, B> {
  pub fn new(source_a: A, source_b: B) -> Self { Self { source_a, source_b } }
}

impl<A, B> Publisher for Zip<A, B>
where
  A: Publisher,
  B: Publisher<Failure = A::Failure>,
{
  type Output = (A::Output, B::Output);
  type Failure = A::Failure;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Self::Output, A::Failure>,
  {
    let downstream = Downstream::new(subscriber);
    let slots: Arc<[SubscriptionSlot]> =
      Arc::from(vec![SubscriptionSlot::default(), SubscriptionSlot::default()]);
    Relay::new(downstream.clone(), slots.clone()).attach();

    let state = MutArc::own(ZipState {
      buffer_a: VecDeque::new(),
      buffer_b: VecDeque::new(),
      completed_a: false,
      completed_b: false,
    });
    let shared = Arc::new(ZipShared { downstream, slots, state });
    self.source_a.subscribe(ZipLeft(shared.clone()));
    if !shared.downstream.is_terminated() {
      self.source_b.subscribe(ZipRight(shared));
    }
  }
}

// ==================== Shared State ====================

struct ZipState<ItemA, ItemB> {
  buffer_a: VecDeque<ItemA>,
  buffer_b: VecDeque<ItemB>,
  completed_a: bool,
  completed_b: bool,
}

impl<ItemA, ItemB> ZipState<ItemA, ItemB> {
  /// A finished source with nothing buffered can never complete a pair.
  fn exhausted(&self) -> bool {
    (self.completed_a && self.buffer_a.is_empty()) || (self.completed_b && self.buffer_b.is_empty())
  }
}

struct ZipShared<ItemA, ItemB, E> {
  downstream: Downstream<(ItemA, ItemB), E>,
  slots: Arc<[SubscriptionSlot]>,
  state: MutArc<ZipState<ItemA, ItemB>>,
}

impl<ItemA, ItemB, E> ZipShared<ItemA, ItemB, E>
where
  ItemA: Send + 'static,
  ItemB: Send + 'static,
  E: Send + 'static,
{
  /// Emits every complete pair, finishing once a source is exhausted.
  /// Pairs are enqueued under the zip lock so concurrent sources cannot
  /// reorder them.
  fn emit_pairs(&self, state: &mut ZipState<ItemA, ItemB>) -> bool {
    while !state.buffer_a.is_empty() && !state.buffer_b.is_empty() {
      if let (Some(a), Some(b)) = (state.buffer_a.pop_front(), state.buffer_b.pop_front()) {
        self.downstream.enqueue((a, b));
      }
    }
    let exhausted = state.exhausted();
    if exhausted {
      self.downstream.enqueue_completion(Completion::Finished);
    }
    exhausted
  }

  fn cancel_sources(&self) {
    for slot in self.slots.iter() {
      slot.cancel();
    }
  }
}

// ==================== Subscribers ====================

impl<ItemA, ItemB, E> ZipShared<ItemA, ItemB, E>
where
  ItemA: Send + 'static,
  ItemB: Send + 'static,
  E: Send + 'static,
{
  fn update(&self, f: impl FnOnce(&mut ZipState<ItemA, ItemB>)) {
    let exhausted = {
      let mut state = self.state.rc_deref_mut();
      f(&mut state);
      self.emit_pairs(&mut state)
    };
    if exhausted {
      self.cancel_sources();
    }
    self.downstream.flush();
  }

  fn completed(&self, side: usize, completion: Completion<E>, mark: fn(&mut ZipState<ItemA, ItemB>)) {
    self.slots[side].release();
    match completion {
      Completion::Finished => self.update(mark),
      Completion::Failure(e) => {
        self.cancel_sources();
        self.downstream.finish(Completion::Failure(e));
      }
    }
  }
}

/// Subscriber for the first source of a zip.
pub struct ZipLeft<ItemA, ItemB, E>(Arc<ZipShared<ItemA, ItemB, E>>);

/// Subscriber for the second source of a zip.
pub struct ZipRight<ItemA, ItemB, E>(Arc<ZipShared<ItemA, ItemB, E>>);

impl<ItemA, ItemB, E> Subscriber<ItemA, E> for ZipLeft<ItemA, ItemB, E>
where
  ItemA: Send + 'static,
  ItemB: Send + 'static,
  E: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.0.slots[0].set(subscription); }

  fn on_value(&mut self, value: ItemA) -> Demand {
    self.0.update(|state| state.buffer_a.push_back(value));
    Demand::NONE
  }

  fn on_completion(&mut self, completion: Completion<E>) {
    self.0.completed(0, completion, |state| state.completed_a = true);
  }
}

impl<ItemA, ItemB, E> Subscriber<ItemB, E> for ZipRight<ItemA, ItemB, E>
where
  ItemA: Send + 'static,
  ItemB: Send + 'static,
  E: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.0.slots[1].set(subscription); }

  fn on_value(&mut self, value: ItemB) -> Demand {
    self.0.update(|state| state.buffer_b.push_back(value));
    Demand::NONE
  }

  fn on_completion(&mut self, completion: Completion<E>) {
    self.0.completed(1, completion, |state| state.completed_b = true);
  }
}
