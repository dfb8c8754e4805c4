use super::BoxedSubscription;
use crate::{demand::Demand, rc::MutArc};

enum SlotState {
  /// No subscription yet; demand requested so far is replayed on arrival.
  Empty(Demand),
  Active(BoxedSubscription),
  /// Cancelled by the owner, or released after the upstream terminated.
  Closed,
}

/// Holder for an upstream subscription.
///
/// Operators request and cancel through the slot without caring whether the
/// upstream has called `on_subscribe` yet:
///
/// - demand requested before arrival is accumulated and forwarded on
///   [`set`](SubscriptionSlot::set),
/// - a subscription arriving after [`cancel`](SubscriptionSlot::cancel) is
///   cancelled immediately.
///
/// The inner lock is never held while calling into the stored subscription.
#[derive(Clone)]
pub struct SubscriptionSlot(MutArc<SlotState>);

impl Default for SubscriptionSlot {
  fn default() -> Self { Self(MutArc::own(SlotState::Empty(Demand::NONE))) }
}

impl SubscriptionSlot {
  pub fn set(&self, subscription: BoxedSubscription) {
    let pending = {
      let mut state = self.0.rc_deref_mut();
      match &*state {
        SlotState::Empty(pending) => {
          let pending = *pending;
          *state = SlotState::Active(subscription.clone());
          Some(pending)
        }
        SlotState::Active(_) | SlotState::Closed => None,
      }
    };
    match pending {
      Some(pending) if !pending.is_none() => subscription.request(pending),
      Some(_) => {}
      None => subscription.cancel(),
    }
  }

  pub fn request(&self, demand: Demand) {
    if demand.is_none() {
      return;
    }
    let active = {
      let mut state = self.0.rc_deref_mut();
      match &mut *state {
        SlotState::Empty(pending) => {
          *pending += demand;
          None
        }
        SlotState::Active(subscription) => Some(subscription.clone()),
        SlotState::Closed => None,
      }
    };
    if let Some(subscription) = active {
      subscription.request(demand);
    }
  }

  pub fn cancel(&self) {
    let previous = std::mem::replace(&mut *self.0.rc_deref_mut(), SlotState::Closed);
    if let SlotState::Active(subscription) = previous {
      subscription.cancel();
    }
  }

  /// Drops the stored subscription without cancelling it, for upstreams that
  /// already delivered their terminal event.
  pub fn release(&self) { *self.0.rc_deref_mut() = SlotState::Closed; }

  /// Forgets a terminated upstream and waits for a fresh one, pre-loaded with
  /// `pending` demand. Returns `false` if the slot was closed in the meantime.
  pub fn reopen(&self, pending: Demand) -> bool {
    let mut state = self.0.rc_deref_mut();
    match &*state {
      SlotState::Closed => false,
      SlotState::Empty(_) | SlotState::Active(_) => {
        *state = SlotState::Empty(pending);
        true
      }
    }
  }

  pub fn is_closed(&self) -> bool { matches!(&*self.0.rc_deref_mut(), SlotState::Closed) }
}
