//! FlatMap operator implementation
//!
//! Every upstream value is mapped to an inner publisher whose values are
//! merged into the output. The upstream is drained eagerly; with a limit on
//! concurrent inner publishers the values that cannot be mapped yet wait in
//! arrival order until an inner publisher finishes.

use std::{collections::VecDeque, sync::Arc};

use crate::{
  demand::Demand,
  publisher::Publisher,
  rc::MutArc,
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, Downstream, Subscription, SubscriptionSlot},
};

// ==================== FlatMap Operator ====================

/// FlatMap operator
///
/// Completes once the upstream finished and every inner publisher finished.
/// The first failure, from the upstream or from any inner publisher, cancels
/// everything else and is delivered on its own.
pub struct FlatMap<P, F> {
  pub source: P,
  pub max: Option<usize>,
  pub func: Arc<F>,
}

impl<P: Clone, F> Clone for FlatMap<P, F> {
  fn clone(&self) -> Self {
    Self { source: self.source.clone(), max: self.max, func: self.func.clone() }
  }
}

impl<P, F> FlatMap<P, F> {
  pub fn new(source: P, max: Option<usize>, func: F) -> Self {
    Self { source, max, func: Arc::new(func) }
  }
}

impl<P, Q, F> Publisher for FlatMap<P, F>
where
  P: Publisher,
  Q: Publisher<Failure = P::Failure>,
  F: Fn(P::Output) -> Q + Send + Sync + 'static,
{
  type Output = Q::Output;
  type Failure = P::Failure;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Q::Output, P::Failure>,
  {
    let shared = Arc::new(FlatShared {
      downstream: Downstream::new(subscriber),
      outer: SubscriptionSlot::default(),
      func: self.func.clone(),
      max: self.max,
      state: MutArc::own(FlatState {
        inners: Vec::new(),
        next_id: 0,
        pending: VecDeque::new(),
        outer_done: false,
        spawning: false,
      }),
    });
    shared
      .downstream
      .attach(Arc::new(FlatMapSubscription(shared.clone())));
    self.source.subscribe(OuterSubscriber(shared));
  }
}

// ==================== Shared State ====================

struct FlatState<T> {
  inners: Vec<(usize, SubscriptionSlot)>,
  next_id: usize,
  /// Upstream values waiting for a free inner slot.
  pending: VecDeque<T>,
  outer_done: bool,
  /// Set while [`FlatShared::drain`] runs.
  spawning: bool,
}

impl<T> FlatState<T> {
  fn is_done(&self) -> bool { self.outer_done && self.inners.is_empty() && self.pending.is_empty() }
}

struct FlatShared<T, Q: Publisher, F> {
  downstream: Downstream<Q::Output, Q::Failure>,
  outer: SubscriptionSlot,
  func: Arc<F>,
  max: Option<usize>,
  state: MutArc<FlatState<T>>,
}

impl<T, Q, F> FlatShared<T, Q, F>
where
  T: Send + 'static,
  Q: Publisher,
  F: Fn(T) -> Q + Send + Sync + 'static,
{
  /// Queues `value` and maps it at once if a slot is free.
  fn dispatch(self: &Arc<Self>, value: T) {
    self.state.rc_deref_mut().pending.push_back(value);
    self.drain();
  }

  fn register(&self, state: &mut FlatState<T>) -> (usize, SubscriptionSlot) {
    let id = state.next_id;
    state.next_id += 1;
    let slot = SubscriptionSlot::default();
    state.inners.push((id, slot.clone()));
    (id, slot)
  }

  fn spawn(self: &Arc<Self>, id: usize, slot: SubscriptionSlot, value: T) {
    slot.request(self.downstream.outstanding());
    let inner = (self.func)(value);
    inner.subscribe(InnerSubscriber { id, slot, shared: self.clone() });
  }

  fn inner_finished(self: &Arc<Self>, id: usize) {
    self
      .state
      .rc_deref_mut()
      .inners
      .retain(|(inner, _)| *inner != id);
    self.drain();
  }

  /// Subscribes to queued values while slots are free, and finishes the
  /// downstream once nothing is left.
  ///
  /// Inner publishers that finish inside `subscribe` call back in here; only
  /// the outermost call loops, the nested ones leave their work to it.
  fn drain(self: &Arc<Self>) {
    {
      let mut state = self.state.rc_deref_mut();
      if state.spawning {
        return;
      }
      state.spawning = true;
    }
    loop {
      let next = {
        let mut state = self.state.rc_deref_mut();
        let free = self.max.map_or(true, |max| state.inners.len() < max);
        let value = if free { state.pending.pop_front() } else { None };
        match value {
          Some(value) => Ok((self.register(&mut state), value)),
          None => {
            state.spawning = false;
            Err(state.is_done())
          }
        }
      };
      match next {
        Ok(((id, slot), value)) => self.spawn(id, slot, value),
        Err(done) => {
          if done {
            self.downstream.finish(Completion::Finished);
          }
          return;
        }
      }
    }
  }

  fn fail(&self, error: Q::Failure) {
    tracing::trace!("flat_map failed, cancelling upstream and inner publishers");
    self.cancel_upstreams();
    self.downstream.finish(Completion::Failure(error));
  }

  fn cancel_upstreams(&self) {
    self.outer.cancel();
    let inners = {
      let mut state = self.state.rc_deref_mut();
      state.pending.clear();
      std::mem::take(&mut state.inners)
    };
    for (_, slot) in inners {
      slot.cancel();
    }
  }
}

struct FlatMapSubscription<T, Q: Publisher, F>(Arc<FlatShared<T, Q, F>>);

impl<T, Q, F> Subscription for FlatMapSubscription<T, Q, F>
where
  T: Send + 'static,
  Q: Publisher,
  F: Fn(T) -> Q + Send + Sync + 'static,
{
  fn request(&self, demand: Demand) {
    self.0.downstream.add_demand(demand);
    let inners: Vec<_> = {
      let state = self.0.state.rc_deref_mut();
      state.inners.iter().map(|(_, slot)| slot.clone()).collect()
    };
    for slot in inners {
      slot.request(demand);
    }
  }

  fn cancel(&self) {
    self.0.cancel_upstreams();
    self.0.downstream.cancel();
  }
}

// ==================== Subscribers ====================

pub struct OuterSubscriber<T, Q: Publisher, F>(Arc<FlatShared<T, Q, F>>);

impl<T, Q, F> Subscriber<T, Q::Failure> for OuterSubscriber<T, Q, F>
where
  T: Send + 'static,
  Q: Publisher,
  F: Fn(T) -> Q + Send + Sync + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.0.outer.set(subscription);
    self.0.outer.request(Demand::Unlimited);
  }

  fn on_value(&mut self, value: T) -> Demand {
    if !self.0.downstream.is_terminated() {
      self.0.dispatch(value);
    }
    Demand::NONE
  }

  fn on_completion(&mut self, completion: Completion<Q::Failure>) {
    self.0.outer.release();
    match completion {
      Completion::Finished => {
        let done = {
          let mut state = self.0.state.rc_deref_mut();
          state.outer_done = true;
          state.is_done()
        };
        if done {
          self.0.downstream.finish(Completion::Finished);
        }
      }
      Completion::Failure(e) => self.0.fail(e),
    }
  }
}

pub struct InnerSubscriber<T, Q: Publisher, F> {
  id: usize,
  slot: SubscriptionSlot,
  shared: Arc<FlatShared<T, Q, F>>,
}

impl<T, Q, F> Subscriber<Q::Output, Q::Failure> for InnerSubscriber<T, Q, F>
where
  T: Send + 'static,
  Q: Publisher,
  F: Fn(T) -> Q + Send + Sync + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.slot.set(subscription); }

  fn on_value(&mut self, value: Q::Output) -> Demand {
    self.shared.downstream.push(value);
    Demand::NONE
  }

  fn on_completion(&mut self, completion: Completion<Q::Failure>) {
    self.slot.release();
    match completion {
      Completion::Finished => self.shared.inner_finished(self.id),
      Completion::Failure(e) => self.shared.fail(e),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;

  use crate::{
    prelude::*,
    test_util::{Event, Recorder},
  };

  #[rxcombine_macro::test]
  fn flattens_every_inner_publisher() {
    let (recorder, record) = Recorder::<i32, Never>::unlimited();
    Publishers::sequence(vec![1, 2, 3])
      .flat_map(|v| Publishers::sequence(vec![v * 10, v * 10 + 1]))
      .subscribe(recorder);
    assert_eq!(record.values(), vec![10, 11, 20, 21, 30, 31]);
    assert_eq!(record.completion(), Some(Completion::Finished));
  }

  #[rxcombine_macro::test]
  fn waits_for_inner_publishers_before_finishing() {
    let inner = PassthroughSubject::<i32, Never>::new();
    let source = inner.clone();
    let (recorder, record) = Recorder::<i32, Never>::unlimited();
    Publishers::just(())
      .flat_map(move |_| source.clone())
      .subscribe(recorder);
    inner.send(5);
    assert_eq!(record.events(), vec![Event::Value(5)]);
    inner.send_completion(Completion::Finished);
    assert_eq!(record.completion(), Some(Completion::Finished));
  }

  #[rxcombine_macro::test]
  fn limits_concurrent_inner_publishers() {
    let inners: Vec<_> = (0..3).map(|_| PassthroughSubject::<i32, Never>::new()).collect();
    let lookup = inners.clone();
    let (recorder, record) = Recorder::<i32, Never>::unlimited();
    Publishers::sequence(vec![0usize, 1, 2])
      .flat_map_max(1, move |i| lookup[i].clone())
      .subscribe(recorder);

    assert_eq!(inners[0].subscriber_count(), 1);
    assert_eq!(inners[1].subscriber_count(), 0);
    inners[0].send(1);
    inners[1].send(99);
    inners[0].send_completion(Completion::Finished);
    assert_eq!(inners[1].subscriber_count(), 1);
    inners[1].send(2);
    inners[1].send_completion(Completion::Finished);
    inners[2].send(3);
    inners[2].send_completion(Completion::Finished);
    assert_eq!(record.values(), vec![1, 2, 3]);
    assert_eq!(record.completion(), Some(Completion::Finished));
  }

  #[rxcombine_macro::test]
  fn inner_failure_cancels_everything() {
    let outer = PassthroughSubject::<i32, &str>::new();
    let (recorder, record) = Recorder::<i32, &str>::unlimited();
    outer
      .clone()
      .flat_map(|v| {
        if v < 0 {
          Publishers::fail::<i32, &str>("negative").erase()
        } else {
          Publishers::just(v)
            .map_error(|never: Never| -> &'static str { match never {} })
            .erase()
        }
      })
      .subscribe(recorder);
    outer.send(1);
    outer.send(-1);
    outer.send(2);
    assert_eq!(record.values(), vec![1]);
    assert_eq!(record.completion(), Some(Completion::Failure("negative")));
    assert_eq!(outer.subscriber_count(), 0);
  }

  #[rxcombine_macro::test]
  fn inner_publishers_share_downstream_demand() {
    let (recorder, record) = Recorder::<u32, Never>::with_demand(Demand::max(3));
    Publishers::sequence(vec![0u32, 100])
      .flat_map(|base| Publishers::sequence(base..base + 10))
      .subscribe(recorder);
    assert_eq!(record.values().len(), 3);
    record.request(Demand::max(4));
    let seen: BTreeSet<_> = record.values().into_iter().collect();
    assert_eq!(seen.len(), 7);
    assert!(record.completion().is_none());
  }

  #[rxcombine_macro::test]
  fn a_long_queue_drains_without_nesting() {
    let gate = PassthroughSubject::<i32, Never>::new();
    let first = gate.clone();
    let (recorder, record) = Recorder::<i32, Never>::unlimited();
    Publishers::sequence(0..20_000)
      .flat_map_max(1, move |i| {
        if i == 0 { first.clone().erase() } else { Publishers::just(i).erase() }
      })
      .subscribe(recorder);
    assert!(record.values().is_empty());
    gate.send_completion(Completion::Finished);
    let values = record.values();
    assert_eq!(values.len(), 19_999);
    assert_eq!(values.first(), Some(&1));
    assert_eq!(values.last(), Some(&19_999));
    assert_eq!(record.completion(), Some(Completion::Finished));
  }
}
