//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

// Core traits
pub use crate::{
  demand::Demand,
  publisher::{AnyPublisher, Just, Publisher, PublisherExt, Publishers},
  subscriber::{Completion, Never, Subscriber},
  subscription::{BoxedSubscription, Cancellable, Subscription},
};
// Operator configuration
pub use crate::ops::{
  buffer::WhenFull,
  handle_events::EventHooks,
  into_stream::PublisherStream,
  retry::{RetryConfig, RetryPolicy},
};
// Failures
pub use crate::error::{BufferError, TimeoutError};
// Schedulers
#[cfg(feature = "tokio-scheduler")]
pub use crate::scheduler::TokioScheduler;
pub use crate::scheduler::{
  Duration, ImmediateScheduler, QueueScheduler, Scheduler, TaskHandle, TestScheduler,
};
// Subjects
pub use crate::subject::{CurrentValueSubject, PassthroughSubject, Subject};
