//! Subscription trait and the building blocks every publisher uses to honour
//! it.
//!
//! - [`Subscription`]: the live link between one publisher and one subscriber.
//! - [`Downstream`]: the serialized, demand-aware delivery point that owns a
//!   subscriber.
//! - [`SubscriptionSlot`]: a holder for an upstream subscription that may
//!   arrive after demand or cancellation did.
//! - [`Cancellable`]: the token handed back to callers; cancelling or dropping
//!   it tears the chain down.

use std::sync::Arc;

use crate::demand::Demand;

mod cancellable;
mod downstream;
mod slot;

pub use cancellable::Cancellable;
pub use downstream::{Downstream, Produced};
pub use slot::SubscriptionSlot;

/// The live link between a publisher and a subscriber.
///
/// Both methods may be called from any thread, at any time, any number of
/// times. Cancellation is idempotent and propagates upstream synchronously: by
/// the time `cancel` returns every upstream subscription this one depends on is
/// cancelled too.
pub trait Subscription: Send + Sync + 'static {
  /// Adds `demand` to the outstanding demand.
  fn request(&self, demand: Demand);

  /// Stops the flow of values and terminal events and releases resources.
  fn cancel(&self);
}

/// Shared handle to a type-erased subscription.
pub type BoxedSubscription = Arc<dyn Subscription>;

/// A subscription that does nothing, handed out when there is nothing left to
/// control.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptySubscription;

impl EmptySubscription {
  pub fn boxed() -> BoxedSubscription { Arc::new(EmptySubscription) }
}

impl Subscription for EmptySubscription {
  fn request(&self, _demand: Demand) {}

  fn cancel(&self) {}
}
