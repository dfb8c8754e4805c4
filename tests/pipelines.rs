//! Integration tests for rxcombine
//!
//! End-to-end behavior of operator chains, subjects and schedulers through the
//! public API only.

use std::{
  collections::BTreeSet,
  marker::PhantomData,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
  },
  thread,
};

use rxcombine::prelude::*;

/// Collects values and the terminal event of one subscription.
#[derive(Clone)]
struct Collected<T, E> {
  values: Arc<Mutex<Vec<T>>>,
  completion: Arc<Mutex<Option<Completion<E>>>>,
}

impl<T: Clone + Send + 'static, E: Clone + Send + 'static> Collected<T, E> {
  fn new() -> Self {
    Self { values: Arc::new(Mutex::new(Vec::new())), completion: Arc::new(Mutex::new(None)) }
  }

  fn sink<P>(&self, publisher: &P) -> Cancellable
  where
    P: Publisher<Output = T, Failure = E>,
  {
    let values = self.values.clone();
    let completion = self.completion.clone();
    publisher.sink_all(
      move |v| values.lock().unwrap().push(v),
      move |c| *completion.lock().unwrap() = Some(c),
    )
  }

  fn values(&self) -> Vec<T> { self.values.lock().unwrap().clone() }

  fn completion(&self) -> Option<Completion<E>> { self.completion.lock().unwrap().clone() }
}

/// Requests demand in small steps and checks every delivery against it.
struct Metered<T> {
  requested: Arc<AtomicUsize>,
  received: Arc<AtomicUsize>,
  violations: Arc<AtomicUsize>,
  subscription: Arc<Mutex<Option<BoxedSubscription>>>,
  _value: PhantomData<fn(T)>,
}

impl<T, E> Subscriber<T, E> for Metered<T>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    *self.subscription.lock().unwrap() = Some(subscription.clone());
    self.requested.fetch_add(2, Ordering::SeqCst);
    subscription.request(Demand::max(2));
  }

  fn on_value(&mut self, _value: T) -> Demand {
    let received = self.received.fetch_add(1, Ordering::SeqCst) + 1;
    if received > self.requested.load(Ordering::SeqCst) {
      self.violations.fetch_add(1, Ordering::SeqCst);
    }
    if received % 2 == 0 {
      self.requested.fetch_add(1, Ordering::SeqCst);
      Demand::max(1)
    } else {
      Demand::NONE
    }
  }

  fn on_completion(&mut self, _completion: Completion<E>) {}
}

fn assert_conserves_demand<P: Publisher>(publisher: P) {
  let requested = Arc::new(AtomicUsize::new(0));
  let received = Arc::new(AtomicUsize::new(0));
  let violations = Arc::new(AtomicUsize::new(0));
  let subscription = Arc::new(Mutex::new(None));
  publisher.subscribe(Metered::<P::Output> {
    requested: requested.clone(),
    received: received.clone(),
    violations: violations.clone(),
    subscription: subscription.clone(),
    _value: PhantomData,
  });
  for _ in 0..5 {
    requested.fetch_add(3, Ordering::SeqCst);
    let handle = subscription.lock().unwrap().clone();
    if let Some(handle) = handle {
      handle.request(Demand::max(3));
    }
    assert!(received.load(Ordering::SeqCst) <= requested.load(Ordering::SeqCst));
  }
  assert_eq!(violations.load(Ordering::SeqCst), 0);
  assert!(received.load(Ordering::SeqCst) > 0);
}

#[rxcombine_macro::test]
fn demand_is_never_exceeded() {
  assert_conserves_demand(Publishers::sequence(0..100).map(|v| v * 2));
  assert_conserves_demand(Publishers::sequence(0..100).filter(|v| v % 3 == 0));
  assert_conserves_demand(Publishers::sequence(0..100).scan(0, |acc, v| acc + v));
  assert_conserves_demand(Publishers::sequence(0..50).merge(Publishers::sequence(50..100)));
  assert_conserves_demand(Publishers::sequence(0..100).zip(Publishers::sequence(0..100)));
  assert_conserves_demand(
    Publishers::sequence(0..20).flat_map(|v| Publishers::sequence(vec![v, v + 100])),
  );
  assert_conserves_demand(Publishers::sequence(0..100).buffer(3, WhenFull::DropNewest));

  let subject = CurrentValueSubject::<i32, Never>::new(0);
  let feeder = subject.clone();
  let fed = Publishers::deferred(move || {
    for v in 1..20 {
      feeder.send(v);
    }
    feeder.clone()
  });
  assert_conserves_demand(fed);
}

#[rxcombine_macro::test]
fn cancelling_many_times_is_cancelling_once() {
  let subject = PassthroughSubject::<i32, Never>::new();
  let collected = Collected::<i32, Never>::new();
  let token = collected.sink(&subject.clone().map(|v| v + 1));

  subject.send(1);
  token.cancel();
  assert!(token.is_cancelled());
  token.cancel();
  token.cancel();
  subject.send(2);
  subject.send_completion(Completion::Finished);

  assert_eq!(collected.values(), vec![2]);
  assert_eq!(collected.completion(), None);
  assert_eq!(subject.subscriber_count(), 0);
}

#[rxcombine_macro::test]
fn dropping_the_token_cancels_the_chain() {
  let subject = PassthroughSubject::<i32, Never>::new();
  let collected = Collected::<i32, Never>::new();
  drop(collected.sink(&subject.clone().filter(|v| v % 2 == 0).map(|v| v * 10)));
  assert_eq!(subject.subscriber_count(), 0);

  subject.send(2);
  subject.send_completion(Completion::Finished);
  assert!(collected.values().is_empty());
  assert_eq!(collected.completion(), None);

  let seen = Arc::new(AtomicUsize::new(0));
  let counter = seen.clone();
  let _ = subject.sink(move |_| {
    counter.fetch_add(1, Ordering::SeqCst);
  });
  subject.send(4);
  assert_eq!(seen.load(Ordering::SeqCst), 0);
}

#[rxcombine_macro::test]
fn zip_stops_with_the_shorter_source() {
  let collected = Collected::<(i32, &str), Never>::new();
  let _token =
    collected.sink(&Publishers::sequence(vec![1, 2, 3]).zip(Publishers::sequence(vec!["x", "y"])));
  assert_eq!(collected.values(), vec![(1, "x"), (2, "y")]);
  assert_eq!(collected.completion(), Some(Completion::Finished));
}

#[rxcombine_macro::test]
fn debounce_emits_after_the_quiet_period() {
  let clock = TestScheduler::new();
  let subject = PassthroughSubject::<i32, Never>::new();
  let emitted = Arc::new(Mutex::new(Vec::new()));
  let e = emitted.clone();
  let timeline = clock.clone();
  let _token = subject
    .clone()
    .debounce(Duration::from_millis(50), clock.clone())
    .sink(move |v| e.lock().unwrap().push((timeline.elapsed(), v)));

  for (at, v) in [(0, 0), (100, 1), (110, 2), (120, 3)] {
    let subject = subject.clone();
    clock.schedule_after(Duration::from_millis(at), move || subject.send(v));
  }
  clock.advance_to(Duration::from_millis(99));
  assert_eq!(*emitted.lock().unwrap(), vec![(Duration::from_millis(50), 0)]);

  clock.advance_to(Duration::from_millis(1_000));
  assert_eq!(
    *emitted.lock().unwrap(),
    vec![(Duration::from_millis(50), 0), (Duration::from_millis(170), 3)]
  );
}

#[rxcombine_macro::test]
fn debounce_emits_only_the_last_value_of_a_burst() {
  let clock = TestScheduler::new();
  let subject = PassthroughSubject::<i32, Never>::new();
  let emitted = Arc::new(Mutex::new(Vec::new()));
  let e = emitted.clone();
  let timeline = clock.clone();
  let _token = subject
    .clone()
    .debounce(Duration::from_millis(50), clock.clone())
    .sink(move |v| e.lock().unwrap().push((timeline.elapsed(), v)));

  for (at, v) in [(100, 1), (110, 2), (120, 3)] {
    let subject = subject.clone();
    clock.schedule_after(Duration::from_millis(at), move || subject.send(v));
  }
  clock.advance_to(Duration::from_millis(169));
  assert!(emitted.lock().unwrap().is_empty());

  clock.advance_to(Duration::from_millis(1_000));
  assert_eq!(*emitted.lock().unwrap(), vec![(Duration::from_millis(170), 3)]);
}

#[rxcombine_macro::test]
fn merge_delivers_only_the_first_failure() {
  let a = PassthroughSubject::<i32, &str>::new();
  let b = PassthroughSubject::<i32, &str>::new();
  let failures = Arc::new(AtomicUsize::new(0));
  let values = Arc::new(Mutex::new(Vec::new()));
  let (f, v) = (failures.clone(), values.clone());
  let _token = a.clone().merge(b.clone()).sink_all(
    move |x| v.lock().unwrap().push(x),
    move |c| {
      if c.is_failure() {
        f.fetch_add(1, Ordering::SeqCst);
      }
    },
  );

  a.send(1);
  b.send(2);
  b.send(3);
  a.send_completion(Completion::Failure("a failed"));
  b.send(4);
  b.send_completion(Completion::Failure("b failed"));

  assert_eq!(*values.lock().unwrap(), vec![1, 2, 3]);
  assert_eq!(failures.load(Ordering::SeqCst), 1);
  assert_eq!(b.subscriber_count(), 0);
}

#[rxcombine_macro::test]
fn late_subscriber_sees_the_current_value_first() {
  let subject = CurrentValueSubject::<i32, Never>::new(0);
  subject.send(5);
  subject.send(10);
  let collected = Collected::<i32, Never>::new();
  let _token = collected.sink(&subject);
  subject.send(15);
  assert_eq!(collected.values(), vec![10, 15]);
}

#[rxcombine_macro::test]
fn retry_gives_up_after_the_configured_attempts() {
  let subscriptions = Arc::new(AtomicUsize::new(0));
  let counter = subscriptions.clone();
  let source = Publishers::deferred(move || {
    counter.fetch_add(1, Ordering::SeqCst);
    Publishers::fail::<i32, &str>("unavailable")
  });
  let collected = Collected::<i32, &str>::new();
  let _token = collected.sink(&source.retry(2));
  assert_eq!(subscriptions.load(Ordering::SeqCst), 3);
  assert_eq!(collected.completion(), Some(Completion::Failure("unavailable")));
  assert!(collected.values().is_empty());
}

#[rxcombine_macro::test]
fn merge_of_subjects_fed_from_threads() {
  let sources: Vec<_> = (0..4).map(|_| PassthroughSubject::<usize, Never>::new()).collect();
  let collected = Collected::<usize, Never>::new();
  let _token = collected.sink(&Publishers::merge_many(sources.clone()));

  let handles: Vec<_> = sources
    .iter()
    .enumerate()
    .map(|(i, subject)| {
      let subject = subject.clone();
      thread::spawn(move || {
        for v in 0..250 {
          subject.send(i * 1_000 + v);
        }
        subject.send_completion(Completion::Finished);
      })
    })
    .collect();
  for handle in handles {
    handle.join().unwrap();
  }

  let seen: BTreeSet<_> = collected.values().into_iter().collect();
  let expected: BTreeSet<_> = (0..4).flat_map(|i| (0..250).map(move |v| i * 1_000 + v)).collect();
  assert_eq!(collected.values().len(), 1_000);
  assert_eq!(seen, expected);
  assert_eq!(collected.completion(), Some(Completion::Finished));
}

#[rxcombine_macro::test]
fn values_hop_through_a_queue_and_back() {
  let queue = QueueScheduler::new("pipeline-queue").unwrap();
  let (tx, rx) = std::sync::mpsc::channel();
  let done = tx.clone();
  let _token = Publishers::sequence(1..=5)
    .map(|v| v * v)
    .receive_on(queue.clone())
    .scan(0, |acc, v| acc + v)
    .sink_all(move |v| tx.send(Some(v)).unwrap(), move |_| done.send(None).unwrap());

  let mut sums = Vec::new();
  while let Some(v) = rx.recv().unwrap() {
    sums.push(v);
  }
  assert_eq!(sums, vec![1, 5, 14, 30, 55]);
}

#[rxcombine_macro::test]
fn recovery_chain() {
  let collected = Collected::<i32, Never>::new();
  let _token = collected.sink(
    &Publishers::sequence(vec![1, 2, 0, 4])
      .map_error(|never: Never| -> String { match never {} })
      .try_map(|v| if v == 0 { Err("division by zero".to_string()) } else { Ok(100 / v) })
      .catch(|e| Publishers::just(e.len() as i32).map_error(|never: Never| -> String { match never {} }))
      .replace_error(-1),
  );
  assert_eq!(collected.values(), vec![100, 50, 16]);
  assert_eq!(collected.completion(), Some(Completion::Finished));
}

#[rxcombine_macro::test]
async fn stream_bridge_follows_the_consumer() {
  use futures::StreamExt;

  let subject = CurrentValueSubject::<i32, Never>::new(1);
  let mut stream = subject.clone().map(|v| v * 2).into_stream();
  assert_eq!(stream.next().await, Some(Ok(2)));
  subject.send(2);
  subject.send(3);
  assert_eq!(stream.next().await, Some(Ok(6)));
  subject.send_completion(Completion::Finished);
  assert_eq!(stream.next().await, None);
}
