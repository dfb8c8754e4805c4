//! IntoStream operator
//!
//! Bridges a publisher into a `futures::Stream` of `Result`s so that it can be
//! consumed with `while let Some(item) = stream.next().await`.
//!
//! ```rust
//! use futures::{executor::block_on, StreamExt};
//! use rxcombine::prelude::*;
//!
//! let stream = Publishers::sequence(vec![1, 2, 3]).into_stream();
//! let items: Vec<_> = block_on(stream.collect());
//! assert_eq!(items, vec![Ok(1), Ok(2), Ok(3)]);
//! ```
//!
//! Demand follows the consumer: one value is requested per poll that finds
//! nothing buffered. A failure is yielded as `Err` and ends the stream.
//! Dropping the stream cancels the subscription.

use std::{
  collections::VecDeque,
  pin::Pin,
  task::{Context, Poll, Waker},
};

use futures::stream::{FusedStream, Stream};

use crate::{
  demand::Demand,
  publisher::Publisher,
  rc::MutArc,
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, SubscriptionSlot},
};

struct StreamState<T, E> {
  queue: VecDeque<T>,
  completion: Option<Completion<E>>,
  waker: Option<Waker>,
  /// A unit of demand is out and no value has answered it yet.
  requested: bool,
  done: bool,
}

/// A `Stream` yielding the values of a publisher, see
/// [`PublisherExt::into_stream`](crate::publisher::PublisherExt::into_stream).
pub struct PublisherStream<T, E> {
  state: MutArc<StreamState<T, E>>,
  upstream: SubscriptionSlot,
}

impl<T, E> PublisherStream<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  /// Subscribes to `publisher` right away; nothing is requested until the
  /// first poll.
  pub fn new<P>(publisher: &P) -> Self
  where
    P: Publisher<Output = T, Failure = E>,
  {
    let state = MutArc::own(StreamState {
      queue: VecDeque::new(),
      completion: None,
      waker: None,
      requested: false,
      done: false,
    });
    let upstream = SubscriptionSlot::default();
    publisher.subscribe(StreamSubscriber { state: state.clone(), upstream: upstream.clone() });
    Self { state, upstream }
  }
}

impl<T, E> Stream for PublisherStream<T, E> {
  type Item = Result<T, E>;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    loop {
      let mut state = self.state.rc_deref_mut();
      if let Some(value) = state.queue.pop_front() {
        return Poll::Ready(Some(Ok(value)));
      }
      if let Some(completion) = state.completion.take() {
        state.done = true;
        return Poll::Ready(completion.failure().map(Err));
      }
      if state.done {
        return Poll::Ready(None);
      }
      state.waker = Some(cx.waker().clone());
      if state.requested {
        return Poll::Pending;
      }
      state.requested = true;
      drop(state);
      // A synchronous publisher answers inside `request`; loop to pick it up.
      self.upstream.request(Demand::max(1));
    }
  }
}

impl<T, E> FusedStream for PublisherStream<T, E> {
  fn is_terminated(&self) -> bool { self.state.rc_deref_mut().done }
}

impl<T, E> Drop for PublisherStream<T, E> {
  fn drop(&mut self) { self.upstream.cancel(); }
}

pub struct StreamSubscriber<T, E> {
  state: MutArc<StreamState<T, E>>,
  upstream: SubscriptionSlot,
}

impl<T, E> StreamSubscriber<T, E> {
  fn wake(&self, update: impl FnOnce(&mut StreamState<T, E>)) {
    let waker = {
      let mut state = self.state.rc_deref_mut();
      update(&mut state);
      state.waker.take()
    };
    if let Some(waker) = waker {
      waker.wake();
    }
  }
}

impl<T, E> Subscriber<T, E> for StreamSubscriber<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.upstream.set(subscription); }

  fn on_value(&mut self, value: T) -> Demand {
    self.wake(|state| {
      state.queue.push_back(value);
      state.requested = false;
    });
    Demand::NONE
  }

  fn on_completion(&mut self, completion: Completion<E>) {
    self.upstream.release();
    self.wake(|state| state.completion = Some(completion));
  }
}
