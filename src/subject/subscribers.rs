use smallvec::SmallVec;

use crate::{subscriber::Completion, subscription::Downstream};

/// Delivery points registered with a subject, keyed by subscription id.
///
/// Most subjects have one or two subscribers, so the list stays inline.
pub(crate) struct Subscribers<T, E> {
  entries: SmallVec<[(usize, Downstream<T, E>); 2]>,
  next_id: usize,
}

pub(crate) type Targets<T, E> = SmallVec<[Downstream<T, E>; 2]>;

impl<T, E> Default for Subscribers<T, E> {
  fn default() -> Self { Self { entries: SmallVec::new(), next_id: 0 } }
}

impl<T, E> Subscribers<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  pub(crate) fn add(&mut self, downstream: Downstream<T, E>) -> usize {
    let id = self.next_id;
    self.next_id += 1;
    self.entries.push((id, downstream));
    id
  }

  pub(crate) fn remove(&mut self, id: usize) -> Option<Downstream<T, E>> {
    let idx = self.entries.iter().position(|(i, _)| *i == id)?;
    Some(self.entries.remove(idx).1)
  }

  /// The live delivery points, pruning the ones that closed on their own.
  pub(crate) fn snapshot(&mut self) -> Targets<T, E> {
    self.entries.retain(|(_, d)| !d.is_closed());
    self.entries.iter().map(|(_, d)| d.clone()).collect()
  }

  pub(crate) fn take_all(&mut self) -> Targets<T, E> {
    self.entries.drain(..).map(|(_, d)| d).collect()
  }
}

/// Hands `value` to every target. The value is cloned for all but the last
/// target, which receives it by move.
///
/// With `coalesce` set a target without demand keeps only the newest value,
/// otherwise the value is dropped for it.
pub(crate) fn broadcast_value<T, E>(targets: &[Downstream<T, E>], value: T, coalesce: bool)
where
  T: Clone + Send + 'static,
  E: Send + 'static,
{
  let deliver = |target: &Downstream<T, E>, value: T| {
    if coalesce {
      target.offer_latest(value);
    } else {
      target.offer(value);
    }
  };
  let Some((last, rest)) = targets.split_last() else {
    return;
  };
  for target in rest {
    deliver(target, value.clone());
  }
  deliver(last, value);
}

pub(crate) fn broadcast_completion<T, E>(targets: &[Downstream<T, E>], completion: Completion<E>)
where
  T: Send + 'static,
  E: Clone + Send + 'static,
{
  let Some((last, rest)) = targets.split_last() else {
    return;
  };
  for target in rest {
    target.finish(completion.clone());
  }
  last.finish(completion);
}
