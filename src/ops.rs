//! Operator implementations.
//!
//! Pass-through operators (`map`, `filter`, `scan` and friends) wrap the
//! downstream subscriber and hand the upstream subscription through
//! unchanged. Operators that fan in several upstreams or move values in time
//! own a [`Downstream`] instead and give the subscriber a [`Relay`], which
//! forwards demand and cancellation to their upstream slots.

use std::sync::Arc;

use crate::{
  demand::Demand,
  rc::MutArc,
  scheduler::TaskHandle,
  subscription::{Downstream, Subscription, SubscriptionSlot},
};

pub mod buffer;
pub mod catch;
pub mod combine_latest;
pub mod debounce;
pub mod delay;
pub mod filter;
pub mod flat_map;
pub mod handle_events;
pub mod into_stream;
pub mod map;
pub mod map_error;
pub mod merge;
pub mod receive_on;
pub mod replace_error;
pub mod retry;
pub mod scan;
pub mod share;
pub mod throttle;
pub mod timeout;
pub mod zip;

// ==================== Relay ====================

type CancelHook = Box<dyn Fn() + Send + Sync>;

/// The subscription handed out by operators that own a [`Downstream`].
///
/// Requests add demand to the downstream and are forwarded unchanged to every
/// upstream. Cancelling cancels the upstreams first, then the optional hook
/// (pending timers), then the downstream.
pub(crate) struct Relay<T, E> {
  downstream: Downstream<T, E>,
  upstreams: Arc<[SubscriptionSlot]>,
  on_cancel: Option<CancelHook>,
}

impl<T, E> Relay<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  pub(crate) fn new(downstream: Downstream<T, E>, upstreams: Arc<[SubscriptionSlot]>) -> Self {
    Self { downstream, upstreams, on_cancel: None }
  }

  pub(crate) fn single(downstream: Downstream<T, E>, upstream: SubscriptionSlot) -> Self {
    Self::new(downstream, Arc::from(vec![upstream]))
  }

  pub(crate) fn on_cancel(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
    self.on_cancel = Some(Box::new(hook));
    self
  }

  /// Wraps the relay and attaches it to its downstream.
  pub(crate) fn attach(self) {
    let downstream = self.downstream.clone();
    downstream.attach(Arc::new(self));
  }
}

impl<T, E> Subscription for Relay<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn request(&self, demand: Demand) {
    self.downstream.add_demand(demand);
    for upstream in self.upstreams.iter() {
      upstream.request(demand);
    }
  }

  fn cancel(&self) {
    for upstream in self.upstreams.iter() {
      upstream.cancel();
    }
    if let Some(hook) = &self.on_cancel {
      hook();
    }
    self.downstream.cancel();
  }
}

// ==================== Timers ====================

/// The scheduled actions of one subscription, so they can be cancelled
/// together.
#[derive(Clone, Default)]
pub(crate) struct Timers(MutArc<Vec<TaskHandle>>);

impl Timers {
  pub(crate) fn track(&self, handle: TaskHandle) {
    let mut handles = self.0.rc_deref_mut();
    handles.retain(|h| !h.is_finished() && !h.is_cancelled());
    handles.push(handle);
  }

  pub(crate) fn cancel_all(&self) {
    let handles = std::mem::take(&mut *self.0.rc_deref_mut());
    for handle in handles {
      handle.cancel();
    }
  }
}
