use std::sync::Arc;

use super::Relay;
use crate::{
  demand::Demand,
  publisher::Publisher,
  rc::MutArc,
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, Downstream, SubscriptionSlot},
};

/// Emits the latest value of each source every time either of them emits,
/// once both have emitted at least once.
///
/// Finishes after both sources finished; a source that finishes without ever
/// emitting finishes the combination at once, since no tuple can follow.
#[derive(Clone)]
pub struct CombineLatest<A, B> {
  pub source_a: A,
  pub source_b: B,
}

impl<A, B> CombineLatest<A, B> {
  pub fn new(source_a: A, source_b: B) -> Self { Self { source_a, source_b } }
}

impl<A, B> Publisher for CombineLatest<A, B>
where
  A: Publisher,
  B: Publisher<Failure = A::Failure>,
  A::Output: Clone,
  B::Output: Clone,
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

    let shared = Arc::new(Latest {
      downstream,
      slots,
      state: MutArc::own(LatestState { a: None, b: None, finished: [false; 2] }),
    });
    self.source_a.subscribe(LatestA(shared.clone()));
    if !shared.downstream.is_terminated() {
      self.source_b.subscribe(LatestB(shared));
    }
  }
}

struct LatestState<ItemA, ItemB> {
  a: Option<ItemA>,
  b: Option<ItemB>,
  finished: [bool; 2],
}

struct Latest<ItemA, ItemB, E> {
  downstream: Downstream<(ItemA, ItemB), E>,
  slots: Arc<[SubscriptionSlot]>,
  state: MutArc<LatestState<ItemA, ItemB>>,
}

impl<ItemA, ItemB, E> Latest<ItemA, ItemB, E>
where
  ItemA: Clone + Send + 'static,
  ItemB: Clone + Send + 'static,
  E: Send + 'static,
{
  fn update(&self, f: impl FnOnce(&mut LatestState<ItemA, ItemB>)) {
    {
      let mut state = self.state.rc_deref_mut();
      f(&mut state);
      if let (Some(a), Some(b)) = (&state.a, &state.b) {
        self.downstream.enqueue((a.clone(), b.clone()));
      }
    }
    self.downstream.flush();
  }

  fn completed(&self, side: usize, completion: Completion<E>) {
    self.slots[side].release();
    match completion {
      Completion::Finished => {
        let done = {
          let mut state = self.state.rc_deref_mut();
          state.finished[side] = true;
          let silent = match side {
            0 => state.a.is_none(),
            _ => state.b.is_none(),
          };
          let done = silent || state.finished.iter().all(|f| *f);
          if done {
            self.downstream.enqueue_completion(Completion::Finished);
          }
          done
        };
        if done {
          for slot in self.slots.iter() {
            slot.cancel();
          }
        }
        self.downstream.flush();
      }
      Completion::Failure(e) => {
        for slot in self.slots.iter() {
          slot.cancel();
        }
        self.downstream.finish(Completion::Failure(e));
      }
    }
  }
}

pub struct LatestA<ItemA, ItemB, E>(Arc<Latest<ItemA, ItemB, E>>);

pub struct LatestB<ItemA, ItemB, E>(Arc<Latest<ItemA, ItemB, E>>);

impl<ItemA, ItemB, E> Subscriber<ItemA, E> for LatestA<ItemA, ItemB, E>
where
  ItemA: Clone + Send + 'static,
  ItemB: Clone + Send + 'static,
  E: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.0.slots[0].set(subscription); }

  fn on_value(&mut self, value: ItemA) -> Demand {
    self.0.update(|state| state.a = Some(value));
    Demand::NONE
  }

  fn on_completion(&mut self, completion: Completion<E>) { self.0.completed(0, completion); }
}

impl<ItemA, ItemB, E> Subscriber<ItemB, E> for LatestB<ItemA, ItemB, E>
where
  ItemA: Clone + Send + 'static,
  ItemB: Clone + Send + 'static,
  E: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.0.slots[1].set(subscription); }

  fn on_value(&mut self, value: ItemB) -> Demand {
    self.0.update(|state| state.b = Some(value));
    Demand::NONE
  }

  fn on_completion(&mut self, completion: Completion<E>) { self.0.completed(1, completion); }
}
