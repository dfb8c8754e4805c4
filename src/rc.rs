//! Shared mutable state used by subscriptions and operators.
//!
//! Every piece of per-subscription state that more than one callback touches
//! lives behind a [`MutArc`]. Guards are short-lived: the engine never calls
//! into user code while one is held.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// `Arc<Mutex<T>>` with poison-tolerant access.
///
/// A panic inside a user callback must not wedge every other subscription
/// sharing the state, so a poisoned lock hands back its guard instead of
/// propagating the panic.
pub struct MutArc<T>(Arc<Mutex<T>>);

impl<T> MutArc<T> {
  pub fn own(t: T) -> Self { Self(Arc::new(Mutex::new(t))) }

  #[inline]
  pub fn rc_deref_mut(&self) -> MutexGuard<'_, T> {
    self.0.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Whether two handles point at the same state.
  #[inline]
  pub fn ptr_eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.0, &other.0) }

  pub fn downgrade(&self) -> WeakMutArc<T> { WeakMutArc(Arc::downgrade(&self.0)) }
}

impl<T> Clone for MutArc<T> {
  #[inline]
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T: Default> Default for MutArc<T> {
  fn default() -> Self { Self::own(T::default()) }
}

impl<T> From<T> for MutArc<T> {
  fn from(t: T) -> Self { Self::own(t) }
}

/// Non-owning counterpart of [`MutArc`].
pub struct WeakMutArc<T>(Weak<Mutex<T>>);

impl<T> WeakMutArc<T> {
  pub fn upgrade(&self) -> Option<MutArc<T>> { self.0.upgrade().map(MutArc) }
}

impl<T> Clone for WeakMutArc<T> {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}
