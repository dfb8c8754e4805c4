//! Retry operator implementation
//!
//! Resubscribes to the same publisher description after a failure, as long
//! as a [`RetryPolicy`] allows it. Values delivered before a failure stay
//! delivered; downstream demand that was not yet met carries over to the next
//! attempt.
//!
//! Simple retry with a count:
//!
//! ```rust
//! use std::sync::{
//!   atomic::{AtomicUsize, Ordering},
//!   Arc, Mutex,
//! };
//!
//! use rxcombine::prelude::*;
//!
//! let attempts = Arc::new(AtomicUsize::new(0));
//! let counter = attempts.clone();
//! let source = Publishers::deferred(move || {
//!   if counter.fetch_add(1, Ordering::SeqCst) < 2 {
//!     Publishers::fail::<i32, &str>("flaky").erase()
//!   } else {
//!     Publishers::just(1).map_error(|never: Never| -> &'static str { match never {} }).erase()
//!   }
//! });
//!
//! let result = Arc::new(Mutex::new(None));
//! let r = result.clone();
//! let _token = source
//!   .retry(3)
//!   .sink_all(|v| assert_eq!(v, 1), move |c| *r.lock().unwrap() = Some(c));
//! assert_eq!(*result.lock().unwrap(), Some(Completion::Finished));
//! assert_eq!(attempts.load(Ordering::SeqCst), 3);
//! ```
//!
//! Custom retry policy based on the failure (e.g., an HTTP status code):
//!
//! ```rust
//! use rxcombine::{ops::retry::RetryPolicy, prelude::*};
//!
//! #[derive(Clone)]
//! struct HttpRetryPolicy {
//!   max_retries: usize,
//! }
//!
//! impl RetryPolicy<u16> for HttpRetryPolicy {
//!   fn should_retry(&self, status: &u16, attempt: usize) -> Option<Duration> {
//!     if attempt >= self.max_retries {
//!       return None;
//!     }
//!     match *status {
//!       500 | 502 | 503 => Some(Duration::from_millis(1)), // Server errors
//!       429 => Some(Duration::from_millis(1)),             // Rate limit
//!       _ => None,                                         // Client errors, do not retry
//!     }
//!   }
//! }
//!
//! let _token = Publishers::fail::<(), u16>(503)
//!   .retry(HttpRetryPolicy { max_retries: 3 })
//!   .sink_all(|_| {}, |c| assert_eq!(c, Completion::Failure(503)));
//! ```

use std::sync::Arc;

use super::{Relay, Timers};
use crate::{
  demand::Demand,
  publisher::Publisher,
  scheduler::{Duration, Scheduler},
  subscriber::{Completion, Subscriber},
  rc::MutArc,
  subscription::{BoxedSubscription, Downstream, SubscriptionSlot},
};

/// Policy for determining whether to retry a failure.
///
/// Simple policies like `usize` (count) and complex policies like
/// [`RetryConfig`] (count + delay + reset) are supported. Implement the trait
/// for custom retry logic.
pub trait RetryPolicy<Err>: Clone + Send + Sync + 'static {
  /// Determines if a retry should occur and the delay before retrying.
  ///
  /// `attempt` is the number of retries already made for the current streak
  /// of failures: 0 on the first failure, 1 on the second, and so on.
  ///
  /// Returns the delay before resubscribing, or `None` to deliver the
  /// failure.
  fn should_retry(&self, err: &Err, attempt: usize) -> Option<Duration>;

  /// Whether a delivered value resets the attempt counter to 0.
  ///
  /// Useful for "connection" scenarios where a value means the connection is
  /// healthy again.
  fn reset_on_success(&self) -> bool { false }
}

impl<Err> RetryPolicy<Err> for usize {
  fn should_retry(&self, _err: &Err, attempt: usize) -> Option<Duration> {
    if attempt < *self { Some(Duration::ZERO) } else { None }
  }
}

/// Builder for a retry policy.
///
/// ```rust
/// use rxcombine::{ops::retry::RetryConfig, scheduler::Duration};
///
/// let config = RetryConfig::new()
///   .count(5)
///   .delay(Duration::from_secs(1))
///   .reset_on_success();
/// ```
#[derive(Clone, Debug, Default)]
pub struct RetryConfig {
  count: Option<usize>,
  delay: Option<Duration>,
  reset_on_success: bool,
}

impl RetryConfig {
  /// Unlimited retries without delay.
  pub fn new() -> Self { Self::default() }

  /// Sets the maximum number of retries: `count(3)` means at most four
  /// subscriptions in total.
  pub fn count(mut self, count: usize) -> Self {
    self.count = Some(count);
    self
  }

  /// Waits `delay` before resubscribing.
  pub fn delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  /// Resets the retry count whenever a value is delivered.
  pub fn reset_on_success(mut self) -> Self {
    self.reset_on_success = true;
    self
  }
}

impl<Err> RetryPolicy<Err> for RetryConfig {
  fn should_retry(&self, _err: &Err, attempt: usize) -> Option<Duration> {
    match self.count {
      Some(count) if attempt >= count => None,
      _ => Some(self.delay.unwrap_or(Duration::ZERO)),
    }
  }

  fn reset_on_success(&self) -> bool { self.reset_on_success }
}

// ==================== Retry Operator ====================

/// Retry operator
///
/// Retry delays run on `scheduler`; a zero delay resubscribes at once.
pub struct Retry<P, R, Sch> {
  pub source: Arc<P>,
  pub policy: R,
  pub scheduler: Sch,
}

impl<P, R: Clone, Sch: Clone> Clone for Retry<P, R, Sch> {
  fn clone(&self) -> Self {
    Self {
      source: self.source.clone(),
      policy: self.policy.clone(),
      scheduler: self.scheduler.clone(),
    }
  }
}

impl<P, R, Sch> Retry<P, R, Sch> {
  pub fn new(source: P, policy: R, scheduler: Sch) -> Self {
    Self { source: Arc::new(source), policy, scheduler }
  }
}

impl<P, R, Sch> Publisher for Retry<P, R, Sch>
where
  P: Publisher,
  R: RetryPolicy<P::Failure>,
  Sch: Scheduler,
{
  type Output = P::Output;
  type Failure = P::Failure;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Output, P::Failure>,
  {
    let downstream = Downstream::new(subscriber);
    let upstream = SubscriptionSlot::default();
    let timers = Timers::default();
    let cancel_timers = timers.clone();
    Relay::single(downstream.clone(), upstream.clone())
      .on_cancel(move || cancel_timers.cancel_all())
      .attach();
    let attempt = Arc::new(Attempt {
      source: self.source.clone(),
      policy: self.policy.clone(),
      scheduler: self.scheduler.clone(),
      downstream,
      upstream,
      timers,
      resubscribe: MutArc::own(Resubscribe::default()),
    });
    attempt.start(0);
  }
}

struct Attempt<P: Publisher, R, Sch> {
  source: Arc<P>,
  policy: R,
  scheduler: Sch,
  downstream: Downstream<P::Output, P::Failure>,
  upstream: SubscriptionSlot,
  timers: Timers,
  resubscribe: MutArc<Resubscribe>,
}

/// A source that fails inside `subscribe` asks for the next attempt before the
/// current one returned. The request is parked here and picked up by the loop
/// in [`Attempt::start`], so the stack does not grow with the attempt count.
#[derive(Default)]
struct Resubscribe {
  subscribing: bool,
  requested: Option<usize>,
}

impl<P, R, Sch> Attempt<P, R, Sch>
where
  P: Publisher,
  R: RetryPolicy<P::Failure>,
  Sch: Scheduler,
{
  fn start(self: &Arc<Self>, mut attempts: usize) {
    {
      let mut resubscribe = self.resubscribe.rc_deref_mut();
      if resubscribe.subscribing {
        resubscribe.requested = Some(attempts);
        return;
      }
      resubscribe.subscribing = true;
    }
    loop {
      self
        .source
        .subscribe(RetrySubscriber { attempt: self.clone(), attempts });
      let mut resubscribe = self.resubscribe.rc_deref_mut();
      match resubscribe.requested.take() {
        Some(next) => attempts = next,
        None => {
          resubscribe.subscribing = false;
          return;
        }
      }
    }
  }

  fn failed(self: &Arc<Self>, error: P::Failure, attempts: usize) {
    let Some(delay) = self.policy.should_retry(&error, attempts) else {
      tracing::debug!(attempts, "retries exhausted, delivering failure");
      self.upstream.release();
      self.downstream.finish(Completion::Failure(error));
      return;
    };
    if !self.upstream.reopen(self.downstream.outstanding()) {
      return;
    }
    tracing::debug!(attempt = attempts + 1, ?delay, "retrying after failure");
    if delay.is_zero() {
      self.start(attempts + 1);
    } else {
      let this = self.clone();
      let handle = self
        .scheduler
        .schedule_after(delay, move || this.start(attempts + 1));
      self.timers.track(handle);
    }
  }
}

pub struct RetrySubscriber<P: Publisher, R, Sch> {
  attempt: Arc<Attempt<P, R, Sch>>,
  attempts: usize,
}

impl<P, R, Sch> Subscriber<P::Output, P::Failure> for RetrySubscriber<P, R, Sch>
where
  P: Publisher,
  R: RetryPolicy<P::Failure>,
  Sch: Scheduler,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.attempt.upstream.set(subscription);
  }

  fn on_value(&mut self, value: P::Output) -> Demand {
    if self.attempts > 0 && self.attempt.policy.reset_on_success() {
      self.attempts = 0;
    }
    self.attempt.downstream.push(value);
    Demand::NONE
  }

  fn on_completion(&mut self, completion: Completion<P::Failure>) {
    match completion {
      Completion::Finished => {
        self.attempt.upstream.release();
        self.attempt.downstream.finish(Completion::Finished);
      }
      Completion::Failure(e) => self.attempt.failed(e, self.attempts),
    }
  }
}
