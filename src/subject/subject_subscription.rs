use super::subject_core::CoreState;
use crate::{
  demand::Demand,
  rc::WeakMutArc,
  subscription::{Downstream, Subscription},
};

/// Subscription handed to a subject's subscriber.
///
/// Demand goes straight to the subscriber's delivery point. Cancelling closes
/// the delivery point and unregisters it; the subject itself is only held
/// weakly so a forgotten subscription does not keep it alive.
pub(crate) struct SubjectSubscription<T, E, R> {
  core: WeakMutArc<CoreState<T, E, R>>,
  id: usize,
  downstream: Downstream<T, E>,
}

impl<T, E, R> SubjectSubscription<T, E, R> {
  pub(crate) fn new(
    core: WeakMutArc<CoreState<T, E, R>>, id: usize, downstream: Downstream<T, E>,
  ) -> Self {
    Self { core, id, downstream }
  }
}

impl<T, E, R> Subscription for SubjectSubscription<T, E, R>
where
  T: Send + 'static,
  E: Send + 'static,
  R: Send + 'static,
{
  fn request(&self, demand: Demand) { self.downstream.add_demand(demand); }

  fn cancel(&self) {
    self.downstream.cancel();
    if let Some(core) = self.core.upgrade() {
      let removed = core.rc_deref_mut().subscribers.remove(self.id);
      drop(removed);
    }
  }
}
