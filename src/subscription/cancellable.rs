use std::fmt::{Debug, Formatter};

use super::SubscriptionSlot;

/// The cancellation token returned by terminal subscribers such as
/// [`sink`](crate::publisher::PublisherExt::sink).
///
/// The token is the sole owner of the subscription chain as seen from the
/// outside: call [`cancel`](Cancellable::cancel) to stop receiving values and
/// release every upstream resource. Dropping the token cancels too, so a token
/// that is not kept alive stops its subscription right away.
///
/// ```rust
/// use rxcombine::prelude::*;
///
/// let subject = PassthroughSubject::<i32, Never>::new();
/// let token = subject.sink(|v| println!("got {v}"));
/// subject.send(1);
/// token.cancel();
/// token.cancel(); // idempotent
/// subject.send(2); // not delivered
/// ```
#[must_use = "dropping a Cancellable cancels its subscription immediately"]
pub struct Cancellable {
  slot: SubscriptionSlot,
}

impl Cancellable {
  pub(crate) fn new(slot: SubscriptionSlot) -> Self { Self { slot } }

  /// Cancels the subscription. Calling it again has no further effect.
  pub fn cancel(&self) {
    if !self.slot.is_closed() {
      tracing::trace!("cancellable cancelled");
    }
    self.slot.cancel();
  }

  /// Whether the subscription was cancelled or already terminated.
  pub fn is_cancelled(&self) -> bool { self.slot.is_closed() }

  /// Moves the token into a collection that owns it from now on.
  pub fn store_in<C: Extend<Cancellable>>(self, collection: &mut C) {
    collection.extend(std::iter::once(self));
  }
}

impl Drop for Cancellable {
  fn drop(&mut self) { self.slot.cancel(); }
}

impl Debug for Cancellable {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Cancellable")
      .field("is_cancelled", &self.is_cancelled())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use crate::prelude::*;

  #[rxcombine_macro::test]
  fn drop_unregisters_from_the_subject() {
    let subject = PassthroughSubject::<i32, Never>::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let token = subject.sink(move |v| s.lock().unwrap().push(v));
    subject.send(1);
    assert_eq!(subject.subscriber_count(), 1);

    drop(token);
    subject.send(2);
    assert_eq!(*seen.lock().unwrap(), vec![1]);
    assert_eq!(subject.subscriber_count(), 0);
  }

  #[rxcombine_macro::test]
  fn stored_tokens_live_as_long_as_their_collection() {
    let subject = PassthroughSubject::<i32, Never>::new();
    let mut tokens = Vec::new();
    subject.sink(|_| {}).store_in(&mut tokens);
    subject.sink(|_| {}).store_in(&mut tokens);
    assert_eq!(subject.subscriber_count(), 2);
    tokens.clear();
    assert_eq!(subject.subscriber_count(), 0);
  }
}
