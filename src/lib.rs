//! # rxcombine: demand-driven reactive streams
//!
//! Publishers describe streams lazily, subscribers pull values from them by
//! requesting [`Demand`](demand::Demand), and operators sit in between,
//! forwarding demand upstream and values downstream.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use rxcombine::prelude::*;
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let s = seen.clone();
//! let _token = Publishers::sequence(0..10)
//!   .filter(|v| v % 2 == 0)
//!   .map(|v| v * 2)
//!   .sink(move |v| s.lock().unwrap().push(v));
//! assert_eq!(*seen.lock().unwrap(), vec![0, 4, 8, 12, 16]);
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Publisher`] | Lazy, typed source of values and one terminal event |
//! | [`Subscriber`] | Consumes values against the demand it requested |
//! | [`Subscription`] | Live link used to request demand or cancel |
//! | [`Subject`] | Publisher fed imperatively through `send` |
//! | [`Scheduler`] | Where and when time-based operators run their work |
//!
//! ## Feature Flags
//!
//! - **`tokio-scheduler`**: a [`Scheduler`] backed by a tokio runtime.
//!
//! [`Publisher`]: publisher::Publisher
//! [`Subscriber`]: subscriber::Subscriber
//! [`Subscription`]: subscription::Subscription
//! [`Subject`]: subject::Subject
//! [`Scheduler`]: scheduler::Scheduler

pub mod demand;
pub mod error;
pub mod ops;
pub mod prelude;
pub mod publisher;
pub mod rc;
pub mod scheduler;
pub mod subject;
pub mod subscriber;
pub mod subscription;
pub mod type_hint;

#[cfg(test)]
mod test_util;

pub use prelude::*;

#[cfg(doctest)]
mod __markdown_doctests {
  mod readme {
    #![doc = include_str!("../README.md")]
  }
}
