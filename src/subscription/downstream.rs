//! Serialized, demand-aware delivery point.
//!
//! Every publisher that owns a subscriber (root sources, subjects and the
//! operators that fan in or reschedule values) hands it to a [`Downstream`].
//! Values may be pushed from any thread; they are queued and delivered by
//! whichever caller wins the drain, one at a time, and only while the
//! subscriber has outstanding demand.
//!
//! Re-entrant calls from inside a callback (a subscriber requesting more demand
//! from `on_value`, an operator pushing while already delivering) never
//! deadlock: they update the shared state and leave the delivery to the drain
//! loop that is already running.

use std::{
  collections::VecDeque,
  sync::{Arc, MutexGuard, Weak},
};

use super::{BoxedSubscription, Subscription};
use crate::{
  demand::Demand,
  rc::MutArc,
  subscriber::{BoxedSubscriber, Completion, Subscriber},
};

/// Result of pulling one step from a lazy source.
pub enum Produced<T, E> {
  Value(T),
  /// The final value; the source finishes right after it.
  Last(T),
  Done(Completion<E>),
}

type Producer<T, E> = Box<dyn FnMut() -> Produced<T, E> + Send>;

struct State<T, E> {
  subscriber: Option<BoxedSubscriber<T, E>>,
  control: Option<Weak<dyn Subscription>>,
  producer: Option<Producer<T, E>>,
  queue: VecDeque<T>,
  demand: Demand,
  terminal: Option<Completion<E>>,
  attached: bool,
  draining: bool,
  closed: bool,
}

/// The delivery point for one subscriber.
///
/// Delivery rules:
///
/// - nothing is delivered before [`attach`](Downstream::attach) has called
///   `on_subscribe`,
/// - a value is delivered only against outstanding demand,
/// - [`Completion::Finished`] waits until the queued values are delivered,
/// - [`Completion::Failure`] is delivered at once and drops queued values,
/// - after the terminal event or [`cancel`](Downstream::cancel) everything is
///   ignored and the subscriber is released.
pub struct Downstream<T, E>(MutArc<State<T, E>>);

impl<T, E> Clone for Downstream<T, E> {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T, E> Downstream<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  pub fn new<S>(subscriber: S) -> Self
  where
    S: Subscriber<T, E>,
  {
    Self::from_boxed(Box::new(subscriber))
  }

  pub fn from_boxed(subscriber: BoxedSubscriber<T, E>) -> Self {
    Self(MutArc::own(State {
      subscriber: Some(subscriber),
      control: None,
      producer: None,
      queue: VecDeque::new(),
      demand: Demand::NONE,
      terminal: None,
      attached: false,
      draining: false,
      closed: false,
    }))
  }

  /// Installs a lazy source that is pulled once per unit of demand whenever
  /// the queue runs dry.
  pub fn with_producer<F>(self, producer: F) -> Self
  where
    F: FnMut() -> Produced<T, E> + Send + 'static,
  {
    self.0.rc_deref_mut().producer = Some(Box::new(producer));
    self
  }

  /// Hands `subscription` to the subscriber and starts delivering.
  ///
  /// Demand the subscriber adds through the return value of `on_value` is
  /// routed through `subscription.request`, so operators observe it the same
  /// way as an explicit request.
  pub fn attach(&self, subscription: BoxedSubscription) {
    let control = Arc::downgrade(&subscription);
    self.attach_with(subscription, Some(control));
  }

  /// Attaches the downstream as its own subscription, for sources that have
  /// nothing upstream to forward demand to.
  pub fn attach_self(&self) { self.attach_with(Arc::new(self.clone()), None); }

  fn attach_with(&self, handed: BoxedSubscription, control: Option<Weak<dyn Subscription>>) {
    let mut state = self.0.rc_deref_mut();
    if state.attached || state.draining {
      return;
    }
    state.control = control;
    state.draining = true;
    let Some(mut subscriber) = state.subscriber.take() else {
      state.draining = false;
      return;
    };
    drop(state);

    subscriber.on_subscribe(handed);

    let mut state = self.0.rc_deref_mut();
    state.attached = true;
    if state.closed {
      state.draining = false;
      drop(state);
      drop(subscriber);
      return;
    }
    state.subscriber = Some(subscriber);
    self.run(state);
  }

  /// Queues `value` for delivery.
  pub fn push(&self, value: T) {
    let mut state = self.0.rc_deref_mut();
    if state.closed || state.terminal.is_some() {
      return;
    }
    state.queue.push_back(value);
    self.drain(state);
  }

  /// Queues `value` without delivering it; a later [`flush`](Self::flush) (or
  /// any other call that drains) hands it over.
  ///
  /// Operators that combine several upstreams enqueue while holding their own
  /// lock, which fixes the order, and flush after releasing it.
  pub fn enqueue(&self, value: T) {
    let mut state = self.0.rc_deref_mut();
    if !state.closed && state.terminal.is_none() {
      state.queue.push_back(value);
    }
  }

  /// Records the terminal event without delivering it, see
  /// [`enqueue`](Self::enqueue).
  pub fn enqueue_completion(&self, completion: Completion<E>) {
    let mut state = self.0.rc_deref_mut();
    if !state.closed && state.terminal.is_none() {
      state.terminal = Some(completion);
    }
  }

  /// Delivers whatever is queued and covered by demand.
  pub fn flush(&self) {
    let state = self.0.rc_deref_mut();
    self.drain(state);
  }

  /// Queues `value` only if the subscriber has demand for it; returns whether
  /// it was accepted.
  pub fn offer(&self, value: T) -> bool {
    let mut state = self.0.rc_deref_mut();
    if state.closed || state.terminal.is_some() {
      return false;
    }
    if !state.demand.covers(state.queue.len() + 1) {
      return false;
    }
    state.queue.push_back(value);
    self.drain(state);
    true
  }

  /// Queues `value` if there is demand for it, otherwise replaces the newest
  /// undelivered value so that the subscriber sees the latest one as soon as
  /// it asks.
  pub fn offer_latest(&self, value: T) {
    let mut state = self.0.rc_deref_mut();
    if state.closed || state.terminal.is_some() {
      return;
    }
    if !state.demand.covers(state.queue.len() + 1) {
      if let Some(newest) = state.queue.back_mut() {
        *newest = value;
        return;
      }
    }
    state.queue.push_back(value);
    self.drain(state);
  }

  /// Schedules the terminal event. Only the first call has any effect.
  pub fn finish(&self, completion: Completion<E>) {
    let mut state = self.0.rc_deref_mut();
    if state.closed || state.terminal.is_some() {
      return;
    }
    state.terminal = Some(completion);
    self.drain(state);
  }

  pub fn add_demand(&self, demand: Demand) {
    if demand.is_none() {
      return;
    }
    let mut state = self.0.rc_deref_mut();
    if state.closed {
      return;
    }
    state.demand += demand;
    self.drain(state);
  }

  /// Stops all delivery and releases the subscriber. Idempotent.
  pub fn cancel(&self) {
    let released = {
      let mut state = self.0.rc_deref_mut();
      if state.closed {
        return;
      }
      state.closed = true;
      state.terminal = None;
      state.control = None;
      (
        state.subscriber.take(),
        state.producer.take(),
        std::mem::take(&mut state.queue),
      )
    };
    tracing::trace!("downstream cancelled");
    drop(released);
  }

  /// Demand not yet covered by queued values.
  pub fn outstanding(&self) -> Demand {
    let state = self.0.rc_deref_mut();
    if state.closed {
      return Demand::NONE;
    }
    state.demand.saturating_sub(state.queue.len())
  }

  /// Whether a terminal event was delivered or the subscription was cancelled.
  pub fn is_closed(&self) -> bool { self.0.rc_deref_mut().closed }

  /// Whether a terminal event is scheduled or already delivered.
  pub fn is_terminated(&self) -> bool {
    let state = self.0.rc_deref_mut();
    state.closed || state.terminal.is_some()
  }

  pub fn queued(&self) -> usize { self.0.rc_deref_mut().queue.len() }

  fn drain<'a>(&'a self, mut state: MutexGuard<'a, State<T, E>>) {
    if state.draining || !state.attached {
      return;
    }
    state.draining = true;
    self.run(state);
  }

  /// The drain loop. Entered with `draining` set; it is the only code that
  /// calls the subscriber once attached, and it never does so with the lock
  /// held.
  fn run<'a>(&'a self, mut state: MutexGuard<'a, State<T, E>>) {
    loop {
      if state.closed {
        state.draining = false;
        let subscriber = state.subscriber.take();
        drop(state);
        drop(subscriber);
        return;
      }

      let failed = matches!(state.terminal, Some(Completion::Failure(_)));
      if failed || (state.queue.is_empty() && state.terminal.is_some()) {
        let completion = state.terminal.take();
        state.closed = true;
        state.draining = false;
        state.control = None;
        let released = (
          state.subscriber.take(),
          state.producer.take(),
          std::mem::take(&mut state.queue),
        );
        drop(state);
        let (subscriber, _producer, _queue) = released;
        if let (Some(mut subscriber), Some(completion)) = (subscriber, completion) {
          tracing::trace!(failed, "downstream delivering terminal event");
          subscriber.on_completion(completion);
        }
        return;
      }

      if !state.queue.is_empty() {
        if !state.demand.consume() {
          break;
        }
        let (Some(value), Some(mut subscriber)) = (state.queue.pop_front(), state.subscriber.take())
        else {
          break;
        };
        drop(state);

        let more = subscriber.on_value(value);

        state = self.0.rc_deref_mut();
        if state.closed {
          state.draining = false;
          drop(state);
          drop(subscriber);
          return;
        }
        state.subscriber = Some(subscriber);
        if !more.is_none() {
          match state.control.as_ref().and_then(Weak::upgrade) {
            Some(control) => {
              drop(state);
              control.request(more);
              state = self.0.rc_deref_mut();
            }
            None => state.demand += more,
          }
        }
        continue;
      }

      if state.demand.covers(1) {
        if let Some(mut producer) = state.producer.take() {
          drop(state);
          let produced = producer();
          state = self.0.rc_deref_mut();
          let spent = if state.closed {
            Some(producer)
          } else {
            match produced {
              Produced::Value(value) => {
                state.queue.push_back(value);
                state.producer = Some(producer);
                None
              }
              Produced::Last(value) => {
                state.queue.push_back(value);
                state.terminal = Some(Completion::Finished);
                Some(producer)
              }
              Produced::Done(completion) => {
                state.terminal = Some(completion);
                Some(producer)
              }
            }
          };
          if spent.is_some() {
            drop(state);
            drop(spent);
            state = self.0.rc_deref_mut();
          }
          continue;
        }
      }

      break;
    }
    state.draining = false;
  }
}

impl<T, E> Subscription for Downstream<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn request(&self, demand: Demand) { self.add_demand(demand); }

  fn cancel(&self) { Downstream::cancel(self); }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_util::{Event, Recorder};

  #[rxcombine_macro::test]
  fn values_wait_for_demand() {
    let (recorder, record) = Recorder::<i32, ()>::with_demand(Demand::NONE);
    let downstream = Downstream::new(recorder);
    downstream.attach_self();

    downstream.push(1);
    downstream.push(2);
    assert!(record.values().is_empty());

    record.request(Demand::max(1));
    assert_eq!(record.values(), vec![1]);
    record.request(Demand::max(5));
    assert_eq!(record.values(), vec![1, 2]);
    assert_eq!(downstream.outstanding(), Demand::max(4));
  }

  #[rxcombine_macro::test]
  fn finished_waits_for_queue_but_failure_does_not() {
    let (recorder, record) = Recorder::<i32, &str>::with_demand(Demand::NONE);
    let downstream = Downstream::new(recorder);
    downstream.attach_self();
    downstream.push(1);
    downstream.finish(Completion::Finished);
    assert!(record.completion().is_none());
    record.request(Demand::max(1));
    assert_eq!(record.events(), vec![Event::Value(1), Event::Completion(Completion::Finished)]);

    let (recorder, record) = Recorder::<i32, &str>::with_demand(Demand::NONE);
    let downstream = Downstream::new(recorder);
    downstream.attach_self();
    downstream.push(1);
    downstream.finish(Completion::Failure("boom"));
    assert_eq!(record.events(), vec![Event::Completion(Completion::Failure("boom"))]);
  }

  #[rxcombine_macro::test]
  fn producer_is_pulled_per_demand() {
    let mut next = 0;
    let (recorder, record) = Recorder::<i32, ()>::with_demand(Demand::max(2));
    let downstream = Downstream::new(recorder).with_producer(move || {
      next += 1;
      if next > 3 { Produced::Done(Completion::Finished) } else { Produced::Value(next) }
    });
    downstream.attach_self();
    assert_eq!(record.values(), vec![1, 2]);
    record.request(Demand::unlimited());
    assert_eq!(record.values(), vec![1, 2, 3]);
    assert_eq!(record.completion(), Some(Completion::Finished));
  }

  #[rxcombine_macro::test]
  fn offer_drops_without_demand_and_offer_latest_coalesces() {
    let (recorder, record) = Recorder::<i32, ()>::with_demand(Demand::NONE);
    let downstream = Downstream::new(recorder);
    downstream.attach_self();
    assert!(!downstream.offer(1));
    downstream.offer_latest(2);
    downstream.offer_latest(3);
    record.request(Demand::max(1));
    assert_eq!(record.values(), vec![3]);
  }

  #[rxcombine_macro::test]
  fn enqueued_events_wait_for_flush() {
    let (recorder, record) = Recorder::<i32, ()>::unlimited();
    let downstream = Downstream::new(recorder);
    downstream.attach_self();
    downstream.enqueue(1);
    downstream.enqueue_completion(Completion::Finished);
    downstream.enqueue(2);
    assert!(record.events().is_empty());
    downstream.flush();
    assert_eq!(record.events(), vec![Event::Value(1), Event::Completion(Completion::Finished)]);
  }

  #[rxcombine_macro::test]
  fn cancel_from_inside_on_value_stops_delivery() {
    let (recorder, record) = Recorder::<i32, ()>::cancelling_after(2);
    let downstream = Downstream::new(recorder);
    downstream.attach_self();
    for v in 0..5 {
      downstream.push(v);
    }
    downstream.finish(Completion::Finished);
    assert_eq!(record.values(), vec![0, 1]);
    assert!(record.completion().is_none());
    assert!(downstream.is_closed());
  }

  #[rxcombine_macro::test]
  fn demand_returned_from_on_value_is_honoured() {
    let (recorder, record) = Recorder::<i32, ()>::with_demand_per_value(Demand::max(1), Demand::max(1));
    let downstream = Downstream::new(recorder);
    downstream.attach_self();
    for v in 0..4 {
      downstream.push(v);
    }
    assert_eq!(record.values(), vec![0, 1, 2, 3]);
  }
}
