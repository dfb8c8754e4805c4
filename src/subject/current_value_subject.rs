use super::{
  subject_core::{Latest, SubjectCore},
  Subject,
};
use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::BoxedSubscription,
};

/// A subject that holds a current value.
///
/// Every new subscriber starts with the current value, delivered once it
/// requests demand. A subscriber that falls behind keeps only the newest
/// value instead of losing it. [`value`](CurrentValueSubject::value) reads the
/// current value at any time, also after completion.
pub struct CurrentValueSubject<T, E> {
  core: SubjectCore<T, E, Latest<T>>,
}

impl<T, E> Clone for CurrentValueSubject<T, E> {
  fn clone(&self) -> Self { Self { core: self.core.clone() } }
}

impl<T, E> CurrentValueSubject<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  pub fn new(initial: T) -> Self { Self { core: SubjectCore::new(Latest(initial)) } }

  pub fn value(&self) -> T { self.core.with_retained(|latest| latest.0.clone()) }

  pub fn subscriber_count(&self) -> usize { self.core.subscriber_count() }

  pub fn is_completed(&self) -> bool { self.core.is_completed() }
}

impl<T, E> Publisher for CurrentValueSubject<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  type Output = T;
  type Failure = E;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T, E>,
  {
    self.core.subscribe(subscriber);
  }
}

impl<T, E> Subject for CurrentValueSubject<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  fn send(&self, value: T) { self.core.send(value); }

  fn send_completion(&self, completion: Completion<E>) { self.core.send_completion(completion); }
}

impl<T, E> Subscriber<T, E> for CurrentValueSubject<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.core.adopt(subscription); }

  fn on_value(&mut self, value: T) -> Demand {
    self.core.send(value);
    Demand::NONE
  }

  fn on_completion(&mut self, completion: Completion<E>) { self.core.send_completion(completion); }
}

#[cfg(test)]
mod tests {
  use crate::{
    prelude::*,
    test_util::{Event, Recorder},
  };

  #[rxcombine_macro::test]
  fn late_subscriber_starts_with_the_latest_value() {
    let subject = CurrentValueSubject::<i32, Never>::new(0);
    let (first, first_record) = Recorder::<i32, Never>::unlimited();
    subject.subscribe(first);
    subject.send(5);
    subject.send(10);
    assert_eq!(subject.value(), 10);

    let (late, late_record) = Recorder::<i32, Never>::unlimited();
    subject.subscribe(late);
    assert_eq!(first_record.values(), vec![0, 5, 10]);
    assert_eq!(late_record.values(), vec![10]);
  }

  #[rxcombine_macro::test]
  fn current_value_waits_for_demand() {
    let subject = CurrentValueSubject::<i32, Never>::new(1);
    let (recorder, record) = Recorder::<i32, Never>::with_demand(Demand::NONE);
    subject.subscribe(recorder);
    assert!(record.values().is_empty());
    record.request(Demand::max(1));
    assert_eq!(record.values(), vec![1]);
  }

  #[rxcombine_macro::test]
  fn slow_subscriber_keeps_the_newest_value() {
    let subject = CurrentValueSubject::<i32, Never>::new(0);
    let (recorder, record) = Recorder::<i32, Never>::with_demand(Demand::NONE);
    subject.subscribe(recorder);
    subject.send(1);
    subject.send(2);
    record.request(Demand::max(2));
    subject.send(3);
    assert_eq!(record.values(), vec![2, 3]);
  }

  #[rxcombine_macro::test]
  fn value_survives_completion() {
    let subject = CurrentValueSubject::<i32, &str>::new(0);
    subject.send(7);
    subject.send_completion(Completion::Finished);
    subject.send(8);
    assert_eq!(subject.value(), 7);

    let (late, record) = Recorder::<i32, &str>::unlimited();
    subject.subscribe(late);
    assert_eq!(record.events(), vec![Event::Completion(Completion::Finished)]);
  }
}
