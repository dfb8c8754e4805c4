use std::sync::Arc;

use super::Publisher;
use crate::subscriber::{BoxedSubscriber, Subscriber};

/// Object-safe face of [`Publisher`].
trait DynPublisher<T, E>: Send + Sync {
  fn subscribe_boxed(&self, subscriber: BoxedSubscriber<T, E>);
}

impl<P: Publisher> DynPublisher<P::Output, P::Failure> for P {
  fn subscribe_boxed(&self, subscriber: BoxedSubscriber<P::Output, P::Failure>) {
    self.subscribe(subscriber)
  }
}

/// A type-erased publisher, for the places that need one type for
/// differently built pipelines.
///
/// ```rust
/// use rxcombine::prelude::*;
///
/// fn numbers(even: bool) -> AnyPublisher<i32, Never> {
///   if even {
///     Publishers::sequence(vec![0, 2, 4]).erase()
///   } else {
///     Publishers::just(1).erase()
///   }
/// }
///
/// let _token = numbers(true).sink(|v| assert_eq!(v % 2, 0));
/// ```
pub struct AnyPublisher<T, E>(Arc<dyn DynPublisher<T, E>>);

impl<T, E> Clone for AnyPublisher<T, E> {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T, E> AnyPublisher<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  pub fn new<P>(publisher: P) -> Self
  where
    P: Publisher<Output = T, Failure = E>,
  {
    Self(Arc::new(publisher))
  }
}

impl<T, E> Publisher for AnyPublisher<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  type Output = T;
  type Failure = E;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T, E>,
  {
    self.0.subscribe_boxed(Box::new(subscriber))
  }
}
