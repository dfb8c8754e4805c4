//! Recording subscriber shared by the unit tests.

use std::sync::{Arc, Mutex};

use crate::{
  demand::Demand,
  subscriber::{Completion, Subscriber},
  subscription::BoxedSubscription,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event<T, E> {
  Value(T),
  Completion(Completion<E>),
}

struct Shared<T, E> {
  events: Mutex<Vec<Event<T, E>>>,
  subscription: Mutex<Option<BoxedSubscription>>,
  subscribed: Mutex<usize>,
}

/// Subscriber that records everything and requests a configurable demand.
pub struct Recorder<T, E> {
  shared: Arc<Shared<T, E>>,
  initial: Demand,
  per_value: Demand,
  cancel_after: Option<usize>,
  seen: usize,
}

/// The test's view on a [`Recorder`].
pub struct Record<T, E> {
  shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for Record<T, E> {
  fn clone(&self) -> Self { Self { shared: self.shared.clone() } }
}

impl<T, E> Recorder<T, E> {
  pub fn unlimited() -> (Self, Record<T, E>) { Self::with_demand(Demand::Unlimited) }

  pub fn with_demand(initial: Demand) -> (Self, Record<T, E>) {
    Self::with_demand_per_value(initial, Demand::NONE)
  }

  pub fn with_demand_per_value(initial: Demand, per_value: Demand) -> (Self, Record<T, E>) {
    let shared = Arc::new(Shared {
      events: Mutex::new(Vec::new()),
      subscription: Mutex::new(None),
      subscribed: Mutex::new(0),
    });
    let recorder = Recorder { shared: shared.clone(), initial, per_value, cancel_after: None, seen: 0 };
    (recorder, Record { shared })
  }

  /// Requests unlimited demand and cancels its own subscription from inside
  /// `on_value` once `n` values arrived.
  pub fn cancelling_after(n: usize) -> (Self, Record<T, E>) {
    let (mut recorder, record) = Self::unlimited();
    recorder.cancel_after = Some(n);
    (recorder, record)
  }
}

impl<T, E> Subscriber<T, E> for Recorder<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    *self.shared.subscribed.lock().unwrap() += 1;
    *self.shared.subscription.lock().unwrap() = Some(subscription.clone());
    if !self.initial.is_none() {
      subscription.request(self.initial);
    }
  }

  fn on_value(&mut self, value: T) -> Demand {
    self.shared.events.lock().unwrap().push(Event::Value(value));
    self.seen += 1;
    if self.cancel_after == Some(self.seen) {
      let subscription = self.shared.subscription.lock().unwrap().clone();
      if let Some(subscription) = subscription {
        subscription.cancel();
      }
    }
    self.per_value
  }

  fn on_completion(&mut self, completion: Completion<E>) {
    self.shared.events.lock().unwrap().push(Event::Completion(completion));
  }
}

impl<T: Clone, E: Clone> Record<T, E> {
  pub fn events(&self) -> Vec<Event<T, E>> { self.shared.events.lock().unwrap().clone() }

  pub fn values(&self) -> Vec<T> {
    self
      .events()
      .into_iter()
      .filter_map(|e| match e {
        Event::Value(v) => Some(v),
        Event::Completion(_) => None,
      })
      .collect()
  }

  pub fn completion(&self) -> Option<Completion<E>> {
    self.events().into_iter().find_map(|e| match e {
      Event::Completion(c) => Some(c),
      Event::Value(_) => None,
    })
  }

  pub fn completions(&self) -> usize {
    self
      .events()
      .iter()
      .filter(|e| matches!(e, Event::Completion(_)))
      .count()
  }
}

impl<T, E> Record<T, E> {
  pub fn request(&self, demand: Demand) {
    let subscription = self.shared.subscription.lock().unwrap().clone();
    if let Some(subscription) = subscription {
      subscription.request(demand);
    }
  }

  pub fn cancel(&self) {
    let subscription = self.shared.subscription.lock().unwrap().clone();
    if let Some(subscription) = subscription {
      subscription.cancel();
    }
  }

  pub fn subscribed(&self) -> usize { *self.shared.subscribed.lock().unwrap() }
}
