use std::{
  collections::VecDeque,
  sync::{Arc, MutexGuard},
};

use super::{
  subject_subscription::SubjectSubscription,
  subscribers::{broadcast_completion, broadcast_value, Subscribers},
};
use crate::{
  demand::Demand,
  rc::MutArc,
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, Downstream},
};

/// What a subject keeps from the values it relays.
pub(crate) trait Retain<T>: Send + 'static {
  /// Whether subscribers without demand keep the newest value instead of
  /// losing it.
  const COALESCE: bool;

  fn store(&mut self, value: &T);

  /// The value a new subscriber starts with.
  fn prime(&self) -> Option<T>;
}

/// Keeps nothing.
impl<T> Retain<T> for () {
  const COALESCE: bool = false;

  fn store(&mut self, _value: &T) {}

  fn prime(&self) -> Option<T> { None }
}

/// Keeps the latest value.
pub(crate) struct Latest<T>(pub(crate) T);

impl<T: Clone + Send + 'static> Retain<T> for Latest<T> {
  const COALESCE: bool = true;

  fn store(&mut self, value: &T) { self.0 = value.clone(); }

  fn prime(&self) -> Option<T> { Some(self.0.clone()) }
}

enum Phase<E> {
  Active,
  Completed(Completion<E>),
}

enum Emission<T, E> {
  Value(T),
  Completion(Completion<E>),
}

pub(crate) struct CoreState<T, E, R> {
  pub(crate) subscribers: Subscribers<T, E>,
  retained: R,
  phase: Phase<E>,
  /// Upstreams the subject was subscribed to as a subscriber.
  upstreams: Vec<BoxedSubscription>,
  pending: VecDeque<Emission<T, E>>,
  emitting: bool,
}

/// State shared by all handles of one subject.
///
/// Sends are serialized: a send that arrives while another one is fanning out
/// (from another thread, or re-entrantly from a subscriber callback) is queued
/// and delivered by the emitting caller, so every subscriber sees the sends in
/// one order.
pub(crate) struct SubjectCore<T, E, R>(MutArc<CoreState<T, E, R>>);

impl<T, E, R> Clone for SubjectCore<T, E, R> {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T, E, R> SubjectCore<T, E, R>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
  R: Retain<T>,
{
  pub(crate) fn new(retained: R) -> Self {
    Self(MutArc::own(CoreState {
      subscribers: Subscribers::default(),
      retained,
      phase: Phase::Active,
      upstreams: Vec::new(),
      pending: VecDeque::new(),
      emitting: false,
    }))
  }

  pub(crate) fn send(&self, value: T) {
    let mut state = self.0.rc_deref_mut();
    if !matches!(state.phase, Phase::Active) {
      return;
    }
    state.retained.store(&value);
    state.pending.push_back(Emission::Value(value));
    self.emit(state);
  }

  pub(crate) fn send_completion(&self, completion: Completion<E>) {
    let mut state = self.0.rc_deref_mut();
    if !matches!(state.phase, Phase::Active) {
      return;
    }
    tracing::trace!(failed = completion.is_failure(), "subject completed");
    state.phase = Phase::Completed(completion.clone());
    state.pending.push_back(Emission::Completion(completion));
    let upstreams = std::mem::take(&mut state.upstreams);
    self.emit(state);
    for upstream in upstreams {
      upstream.cancel();
    }
  }

  /// Drains the emission queue unless another caller already does.
  fn emit<'a>(&'a self, mut state: MutexGuard<'a, CoreState<T, E, R>>) {
    if state.emitting {
      return;
    }
    state.emitting = true;
    loop {
      let Some(emission) = state.pending.pop_front() else {
        state.emitting = false;
        return;
      };
      match emission {
        Emission::Value(value) => {
          let targets = state.subscribers.snapshot();
          drop(state);
          broadcast_value(&targets, value, R::COALESCE);
        }
        Emission::Completion(completion) => {
          let targets = state.subscribers.take_all();
          drop(state);
          broadcast_completion(&targets, completion);
        }
      }
      state = self.0.rc_deref_mut();
    }
  }

  pub(crate) fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T, E>,
  {
    let downstream = Downstream::new(subscriber);
    let mut state = self.0.rc_deref_mut();
    let completed = match &state.phase {
      Phase::Completed(completion) => Some(completion.clone()),
      Phase::Active => None,
    };
    if let Some(completion) = completed {
      drop(state);
      downstream.enqueue_completion(completion);
      downstream.attach_self();
      return;
    }
    if let Some(value) = state.retained.prime() {
      downstream.push(value);
    }
    let id = state.subscribers.add(downstream.clone());
    drop(state);
    tracing::trace!(id, "subject subscribed");
    let subscription = SubjectSubscription::new(self.0.downgrade(), id, downstream.clone());
    downstream.attach(Arc::new(subscription));
  }

  /// Keeps `subscription` so that completing the subject cancels it, then asks
  /// it for everything.
  pub(crate) fn adopt(&self, subscription: BoxedSubscription) {
    let mut state = self.0.rc_deref_mut();
    if !matches!(state.phase, Phase::Active) {
      drop(state);
      subscription.cancel();
      return;
    }
    state.upstreams.push(subscription.clone());
    drop(state);
    subscription.request(Demand::unlimited());
  }

  pub(crate) fn subscriber_count(&self) -> usize {
    let mut state = self.0.rc_deref_mut();
    state.subscribers.snapshot().len()
  }

  pub(crate) fn is_completed(&self) -> bool {
    matches!(self.0.rc_deref_mut().phase, Phase::Completed(_))
  }

  pub(crate) fn with_retained<U>(&self, f: impl FnOnce(&R) -> U) -> U {
    f(&self.0.rc_deref_mut().retained)
  }
}
