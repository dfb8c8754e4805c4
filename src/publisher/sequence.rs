use super::Publisher;
use crate::{
  subscriber::{Completion, Never, Subscriber},
  subscription::{Downstream, Produced},
};

/// Emits the items of a collection, pulling the next one only when the
/// subscriber has demand for it. The finish follows the last item without
/// waiting for more demand.
#[derive(Clone, Debug)]
pub struct Sequence<I> {
  items: I,
}

impl<I> Sequence<I> {
  pub fn new(items: I) -> Self { Self { items } }
}

impl<I> Publisher for Sequence<I>
where
  I: IntoIterator + Clone + Send + Sync + 'static,
  I::IntoIter: Send + 'static,
  I::Item: Send + 'static,
{
  type Output = I::Item;
  type Failure = Never;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<I::Item, Never>,
  {
    let mut items = self.items.clone().into_iter().peekable();
    let mut downstream = Downstream::new(subscriber);
    if items.peek().is_none() {
      downstream.finish(Completion::Finished);
    } else {
      downstream = downstream.with_producer(move || match items.next() {
        Some(item) if items.peek().is_none() => Produced::Last(item),
        Some(item) => Produced::Value(item),
        None => Produced::Done(Completion::Finished),
      });
    }
    downstream.attach_self();
  }
}
