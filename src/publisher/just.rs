use super::Publisher;
use crate::subscriber::{Completion, Never, Subscriber};
use crate::subscription::Downstream;

/// Emits one value once there is demand for it, then finishes.
///
/// ```rust
/// use rxcombine::prelude::*;
///
/// let _token = Publishers::just("hello").sink(|v| assert_eq!(v, "hello"));
/// ```
#[derive(Clone, Debug)]
pub struct Just<T> {
  value: T,
}

impl<T> Just<T> {
  pub fn new(value: T) -> Self { Self { value } }
}

impl<T> Publisher for Just<T>
where
  T: Clone + Send + Sync + 'static,
{
  type Output = T;
  type Failure = Never;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T, Never>,
  {
    let downstream = Downstream::new(subscriber);
    downstream.push(self.value.clone());
    downstream.finish(Completion::Finished);
    downstream.attach_self();
  }
}
