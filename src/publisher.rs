//! Publisher trait, operator methods and root publishers.
//!
//! A [`Publisher`] is a lazy description of a stream: nothing happens until a
//! [`Subscriber`] is attached, and every subscription gets its own state.
//! Operators are chained through [`PublisherExt`], which is implemented for
//! every publisher. Each operator method consumes the receiver and returns a
//! new publisher value.
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use rxcombine::prelude::*;
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let s = seen.clone();
//! let _token = Publishers::sequence(0..10)
//!   .filter(|v| v % 2 == 0)
//!   .map(|v| v * 10)
//!   .sink(move |v| s.lock().unwrap().push(v));
//! assert_eq!(*seen.lock().unwrap(), vec![0, 20, 40, 60, 80]);
//! ```
//!
//! Root publishers are reachable through the [`Publishers`] namespace.

use std::sync::Arc;

use crate::{
  ops::{
    buffer::{Buffer, BufferWithFlush, WhenFull},
    catch::Catch,
    combine_latest::CombineLatest,
    debounce::Debounce,
    delay::Delay,
    filter::{Filter, TryFilter},
    flat_map::FlatMap,
    handle_events::{EventHooks, HandleEvents},
    into_stream::PublisherStream,
    map::{CompactMap, Map, TryMap},
    map_error::MapError,
    merge::{Merge, MergeMany},
    receive_on::ReceiveOn,
    replace_error::ReplaceError,
    retry::{Retry, RetryPolicy},
    scan::{Scan, TryScan},
    share::Share,
    throttle::Throttle,
    timeout::Timeout,
    zip::Zip,
  },
  scheduler::{Duration, ImmediateScheduler, Scheduler},
  subscriber::{Completion, Never, Sink, Subscriber},
  subscription::Cancellable,
};

mod any;
mod deferred;
mod just;
mod sequence;
mod timer;
mod trivial;

pub use any::AnyPublisher;
pub use deferred::Deferred;
pub use just::Just;
pub use sequence::Sequence;
pub use timer::Timer;
pub use trivial::{Empty, Fail, NeverPublisher};

// ============================================================================
// Publisher Trait
// ============================================================================

/// A typed, lazy source of values followed by one terminal event.
///
/// `subscribe` must call `on_subscribe` on the subscriber before anything
/// else and must not report failures in any other way than through
/// `on_completion`. Subscribing twice yields two independent subscriptions.
pub trait Publisher: Send + Sync + 'static {
  type Output: Send + 'static;
  type Failure: Send + 'static;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Self::Output, Self::Failure>;
}

impl<P: Publisher> Publisher for Arc<P> {
  type Output = P::Output;
  type Failure = P::Failure;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Self::Output, Self::Failure>,
  {
    (**self).subscribe(subscriber)
  }
}

// ============================================================================
// Operator Methods
// ============================================================================

/// Operator methods available on every [`Publisher`].
pub trait PublisherExt: Publisher + Sized {
  /// Transforms every value with `f`.
  fn map<U, F>(self, f: F) -> Map<Self, F>
  where
    F: Fn(Self::Output) -> U + Send + Sync + 'static,
    U: Send + 'static,
  {
    Map::new(self, f)
  }

  /// Like [`map`](Self::map); an `Err` cancels the upstream and fails the
  /// stream.
  fn try_map<U, F>(self, f: F) -> TryMap<Self, F>
  where
    F: Fn(Self::Output) -> Result<U, Self::Failure> + Send + Sync + 'static,
    U: Send + 'static,
  {
    TryMap::new(self, f)
  }

  /// Transforms values and drops the `None`s. Dropped values do not count
  /// against downstream demand.
  fn compact_map<U, F>(self, f: F) -> CompactMap<Self, F>
  where
    F: Fn(Self::Output) -> Option<U> + Send + Sync + 'static,
    U: Send + 'static,
  {
    CompactMap::new(self, f)
  }

  /// Keeps only the values matching `predicate`. Every dropped value gives
  /// one unit of demand back to the upstream.
  fn filter<F>(self, predicate: F) -> Filter<Self, F>
  where
    F: Fn(&Self::Output) -> bool + Send + Sync + 'static,
  {
    Filter::new(self, predicate)
  }

  fn try_filter<F>(self, predicate: F) -> TryFilter<Self, F>
  where
    F: Fn(&Self::Output) -> Result<bool, Self::Failure> + Send + Sync + 'static,
  {
    TryFilter::new(self, predicate)
  }

  /// Emits the running fold of the values. The accumulator starts from a
  /// clone of `initial` for every subscription.
  fn scan<A, F>(self, initial: A, f: F) -> Scan<Self, A, F>
  where
    A: Clone + Send + Sync + 'static,
    F: Fn(A, Self::Output) -> A + Send + Sync + 'static,
  {
    Scan::new(self, initial, f)
  }

  fn try_scan<A, F>(self, initial: A, f: F) -> TryScan<Self, A, F>
  where
    A: Clone + Send + Sync + 'static,
    F: Fn(A, Self::Output) -> Result<A, Self::Failure> + Send + Sync + 'static,
  {
    TryScan::new(self, initial, f)
  }

  fn map_error<E2, F>(self, f: F) -> MapError<Self, F>
  where
    F: Fn(Self::Failure) -> E2 + Send + Sync + 'static,
    E2: Send + 'static,
  {
    MapError::new(self, f)
  }

  /// Observes the lifecycle without changing it.
  fn handle_events(self, hooks: EventHooks<Self::Output, Self::Failure>) -> HandleEvents<Self> {
    HandleEvents::new(self, hooks)
  }

  /// Maps every value to a publisher and merges all of them.
  fn flat_map<Q, F>(self, f: F) -> FlatMap<Self, F>
  where
    F: Fn(Self::Output) -> Q + Send + Sync + 'static,
    Q: Publisher<Failure = Self::Failure>,
  {
    FlatMap::new(self, None, f)
  }

  /// Like [`flat_map`](Self::flat_map) with at most `max` inner publishers
  /// subscribed at once; further values wait for a free slot.
  fn flat_map_max<Q, F>(self, max: usize, f: F) -> FlatMap<Self, F>
  where
    F: Fn(Self::Output) -> Q + Send + Sync + 'static,
    Q: Publisher<Failure = Self::Failure>,
  {
    FlatMap::new(self, Some(max.max(1)), f)
  }

  fn zip<B>(self, other: B) -> Zip<Self, B>
  where
    B: Publisher<Failure = Self::Failure>,
  {
    Zip::new(self, other)
  }

  fn combine_latest<B>(self, other: B) -> CombineLatest<Self, B>
  where
    B: Publisher<Failure = Self::Failure>,
    Self::Output: Clone,
    B::Output: Clone,
  {
    CombineLatest::new(self, other)
  }

  fn merge<B>(self, other: B) -> Merge<Self, B>
  where
    B: Publisher<Output = Self::Output, Failure = Self::Failure>,
  {
    Merge::new(self, other)
  }

  fn delay<Sch: Scheduler>(self, duration: Duration, scheduler: Sch) -> Delay<Self, Sch> {
    Delay::new(self, duration, scheduler)
  }

  fn debounce<Sch: Scheduler>(self, duration: Duration, scheduler: Sch) -> Debounce<Self, Sch> {
    Debounce::new(self, duration, scheduler)
  }

  /// Emits at most one value per `interval`; `latest` picks which value of a
  /// window survives. A value collected when the upstream finishes is emitted
  /// before the completion.
  fn throttle<Sch: Scheduler>(
    self, interval: Duration, scheduler: Sch, latest: bool,
  ) -> Throttle<Self, Sch> {
    Throttle::new(self, interval, scheduler, latest)
  }

  /// Collects values into batches of `size`.
  fn buffer(self, size: usize, when_full: WhenFull) -> Buffer<Self> {
    Buffer::new(self, size, when_full)
  }

  /// Like [`buffer`](Self::buffer), additionally emitting the collected
  /// values whenever `trigger` emits.
  fn buffer_with_flush<Q: Publisher>(
    self, size: usize, when_full: WhenFull, trigger: Q,
  ) -> BufferWithFlush<Self, Q> {
    BufferWithFlush::new(self, size, when_full, trigger)
  }

  /// Fails with [`TimeoutError::Elapsed`](crate::error::TimeoutError::Elapsed)
  /// when no event arrives for `duration`.
  fn timeout<Sch: Scheduler>(self, duration: Duration, scheduler: Sch) -> Timeout<Self, Sch> {
    Timeout::new(self, duration, scheduler)
  }

  /// Delivers every event through `scheduler`.
  fn receive_on<Sch: Scheduler>(self, scheduler: Sch) -> ReceiveOn<Self, Sch> {
    ReceiveOn::new(self, scheduler)
  }

  /// Replaces a failed upstream by the publisher `handler` builds from the
  /// failure.
  fn catch<Q, F>(self, handler: F) -> Catch<Self, F>
  where
    F: Fn(Self::Failure) -> Q + Send + Sync + 'static,
    Q: Publisher<Output = Self::Output>,
  {
    Catch::new(self, handler)
  }

  /// Resubscribes after a failure as long as `policy` allows it. Retry delays
  /// are ignored, see [`retry_on`](Self::retry_on).
  fn retry<R>(self, policy: R) -> Retry<Self, R, ImmediateScheduler>
  where
    R: RetryPolicy<Self::Failure>,
  {
    Retry::new(self, policy, ImmediateScheduler)
  }

  /// Like [`retry`](Self::retry), waiting the delays of `policy` on
  /// `scheduler`.
  fn retry_on<R, Sch>(self, policy: R, scheduler: Sch) -> Retry<Self, R, Sch>
  where
    R: RetryPolicy<Self::Failure>,
    Sch: Scheduler,
  {
    Retry::new(self, policy, scheduler)
  }

  /// Turns a failure into `value` followed by a normal finish.
  fn replace_error(self, value: Self::Output) -> ReplaceError<Self>
  where
    Self::Output: Clone + Sync,
  {
    ReplaceError::new(self, value)
  }

  /// Shares one upstream subscription among all current subscribers.
  fn share(self) -> Share<Self>
  where
    Self::Output: Clone,
    Self::Failure: Clone,
  {
    Share::new(self)
  }

  /// Bridges into a `futures::Stream` of `Result`s. One value is requested
  /// per poll.
  fn into_stream(self) -> PublisherStream<Self::Output, Self::Failure> {
    PublisherStream::new(&self)
  }

  fn erase(self) -> AnyPublisher<Self::Output, Self::Failure> { AnyPublisher::new(self) }

  /// Subscribes with unlimited demand, calling `on_value` for every value.
  fn sink<N>(&self, on_value: N) -> Cancellable
  where
    Self: Publisher<Failure = Never>,
    N: FnMut(Self::Output) + Send + 'static,
  {
    self.sink_all(on_value, |_: Completion<Never>| {})
  }

  /// Subscribes with unlimited demand and closures for values and the
  /// terminal event.
  fn sink_all<N, C>(&self, on_value: N, on_completion: C) -> Cancellable
  where
    N: FnMut(Self::Output) + Send + 'static,
    C: FnOnce(Completion<Self::Failure>) + Send + 'static,
  {
    let (sink, token) = Sink::new(on_value, on_completion);
    self.subscribe(sink);
    token
  }
}

impl<P: Publisher> PublisherExt for P {}

// ============================================================================
// Root Publishers
// ============================================================================

/// Namespace of the root publishers.
pub struct Publishers;

impl Publishers {
  /// One value, then finished.
  pub fn just<T>(value: T) -> Just<T>
  where
    T: Clone + Send + Sync + 'static,
  {
    Just::new(value)
  }

  /// Fails immediately, without waiting for demand.
  pub fn fail<T, E>(error: E) -> Fail<T, E>
  where
    T: Send + 'static,
    E: Clone + Send + Sync + 'static,
  {
    Fail::new(error)
  }

  /// Finishes immediately.
  pub fn empty<T, E>() -> Empty<T, E>
  where
    T: Send + 'static,
    E: Send + 'static,
  {
    Empty::new()
  }

  /// Emits the items of `items`, pulled lazily as demand arrives.
  pub fn sequence<I>(items: I) -> Sequence<I>
  where
    I: IntoIterator + Clone + Send + Sync + 'static,
    I::IntoIter: Send + 'static,
    I::Item: Send + 'static,
  {
    Sequence::new(items)
  }

  /// Ticks `0, 1, 2, …` every `period` on `scheduler`. Ticks without demand
  /// are dropped.
  pub fn timer<Sch: Scheduler>(period: Duration, scheduler: Sch) -> Timer<Sch> {
    Timer::new(period, scheduler)
  }

  /// Builds a fresh publisher with `factory` for every subscription.
  pub fn deferred<P, F>(factory: F) -> Deferred<F>
  where
    F: Fn() -> P + Send + Sync + 'static,
    P: Publisher,
  {
    Deferred::new(factory)
  }

  /// Never emits and never terminates.
  pub fn never<T, E>() -> NeverPublisher<T, E>
  where
    T: Send + 'static,
    E: Send + 'static,
  {
    NeverPublisher::new()
  }

  /// Merges any number of publishers of the same type.
  pub fn merge_many<P, I>(sources: I) -> MergeMany<P>
  where
    P: Publisher,
    I: IntoIterator<Item = P>,
  {
    MergeMany::new(sources)
  }
}
