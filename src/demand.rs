//! Demand: how many more values a subscriber is willing to receive.

use std::{
  fmt::{Display, Formatter},
  ops::{Add, AddAssign},
};

/// The number of additional values a subscriber asks for.
///
/// Demand only ever grows through [`Subscription::request`] or the value
/// returned from [`Subscriber::on_value`], and shrinks by exactly one for every
/// delivered value. `Demand::Max(0)` means "pause".
///
/// Adding to `Unlimited` stays `Unlimited`; adding two finite demands that
/// overflow `usize` saturates to `Unlimited`.
///
/// [`Subscription::request`]: crate::subscription::Subscription::request
/// [`Subscriber::on_value`]: crate::subscriber::Subscriber::on_value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Demand {
  Unlimited,
  Max(usize),
}

impl Demand {
  /// No additional demand.
  pub const NONE: Demand = Demand::Max(0);

  #[inline]
  pub fn unlimited() -> Self { Demand::Unlimited }

  #[inline]
  pub fn none() -> Self { Demand::NONE }

  #[inline]
  pub fn max(count: usize) -> Self { Demand::Max(count) }

  #[inline]
  pub fn is_none(&self) -> bool { matches!(self, Demand::Max(0)) }

  #[inline]
  pub fn is_unlimited(&self) -> bool { matches!(self, Demand::Unlimited) }

  /// The finite count, `None` for unlimited demand.
  #[inline]
  pub fn count(&self) -> Option<usize> {
    match self {
      Demand::Unlimited => None,
      Demand::Max(n) => Some(*n),
    }
  }

  /// Whether at least `n` more values may be delivered.
  #[inline]
  pub fn covers(&self, n: usize) -> bool {
    match self {
      Demand::Unlimited => true,
      Demand::Max(m) => *m >= n,
    }
  }

  /// Consumes one unit of demand for a delivered value.
  ///
  /// Returns `false` without changing anything when no demand is left.
  pub fn consume(&mut self) -> bool {
    match self {
      Demand::Unlimited => true,
      Demand::Max(0) => false,
      Demand::Max(n) => {
        *n -= 1;
        true
      }
    }
  }

  /// Demand left after `n` values are already spoken for.
  pub fn saturating_sub(self, n: usize) -> Demand {
    match self {
      Demand::Unlimited => Demand::Unlimited,
      Demand::Max(m) => Demand::Max(m.saturating_sub(n)),
    }
  }
}

impl Default for Demand {
  fn default() -> Self { Demand::NONE }
}

impl From<usize> for Demand {
  fn from(n: usize) -> Self { Demand::Max(n) }
}

impl Add for Demand {
  type Output = Demand;

  fn add(self, rhs: Demand) -> Demand {
    match (self, rhs) {
      (Demand::Max(a), Demand::Max(b)) => a.checked_add(b).map_or(Demand::Unlimited, Demand::Max),
      _ => Demand::Unlimited,
    }
  }
}

impl Add<usize> for Demand {
  type Output = Demand;

  fn add(self, rhs: usize) -> Demand { self + Demand::Max(rhs) }
}

impl AddAssign for Demand {
  fn add_assign(&mut self, rhs: Demand) { *self = *self + rhs; }
}

impl AddAssign<usize> for Demand {
  fn add_assign(&mut self, rhs: usize) { *self = *self + rhs; }
}

impl PartialOrd for Demand {
  fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> { Some(self.cmp(other)) }
}

impl Ord for Demand {
  fn cmp(&self, other: &Self) -> std::cmp::Ordering {
    match (self, other) {
      (Demand::Unlimited, Demand::Unlimited) => std::cmp::Ordering::Equal,
      (Demand::Unlimited, _) => std::cmp::Ordering::Greater,
      (_, Demand::Unlimited) => std::cmp::Ordering::Less,
      (Demand::Max(a), Demand::Max(b)) => a.cmp(b),
    }
  }
}

impl Display for Demand {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Demand::Unlimited => f.write_str("unlimited"),
      Demand::Max(n) => write!(f, "max({n})"),
    }
  }
}
