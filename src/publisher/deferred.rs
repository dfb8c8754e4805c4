use std::sync::Arc;

use super::Publisher;
use crate::subscriber::Subscriber;

/// Calls a factory for every subscription and subscribes to the publisher it
/// returns.
pub struct Deferred<F> {
  factory: Arc<F>,
}

impl<F> Clone for Deferred<F> {
  fn clone(&self) -> Self { Self { factory: self.factory.clone() } }
}

impl<F> Deferred<F> {
  pub fn new(factory: F) -> Self { Self { factory: Arc::new(factory) } }
}

impl<F, P> Publisher for Deferred<F>
where
  F: Fn() -> P + Send + Sync + 'static,
  P: Publisher,
{
  type Output = P::Output;
  type Failure = P::Failure;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Output, P::Failure>,
  {
    (self.factory)().subscribe(subscriber)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;
  use crate::{prelude::*, test_util::Recorder};

  #[rxcombine_macro::test]
  fn factory_runs_per_subscription() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    let source = Publishers::deferred(move || Publishers::just(c.fetch_add(1, Ordering::SeqCst)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let (first, first_record) = Recorder::<usize, Never>::unlimited();
    let (second, second_record) = Recorder::<usize, Never>::unlimited();
    source.subscribe(first);
    source.subscribe(second);
    assert_eq!(first_record.values(), vec![0]);
    assert_eq!(second_record.values(), vec![1]);
  }
}
