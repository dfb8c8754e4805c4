//! Failure types introduced by operators.
//!
//! Operators that can fail on their own wrap the upstream failure type so the
//! pipeline keeps a single failure type per stage.

use thiserror::Error;

/// Failure of a [`buffer`](crate::publisher::PublisherExt::buffer) stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError<E> {
  /// The buffer was full and its policy is [`WhenFull::Fail`](crate::ops::buffer::WhenFull::Fail).
  #[error("buffer overflow: capacity of {capacity} values exceeded")]
  Overflow { capacity: usize },
  #[error("upstream failed: {0}")]
  Upstream(E),
}

/// Failure of a [`timeout`](crate::publisher::PublisherExt::timeout) stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeoutError<E> {
  /// No value or completion arrived within the window.
  #[error("no event within {0:?}")]
  Elapsed(std::time::Duration),
  #[error("upstream failed: {0}")]
  Upstream(E),
}

impl<E> BufferError<E> {
  pub fn is_overflow(&self) -> bool { matches!(self, BufferError::Overflow { .. }) }
}

impl<E> TimeoutError<E> {
  pub fn is_elapsed(&self) -> bool { matches!(self, TimeoutError::Elapsed(_)) }
}
