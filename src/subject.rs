//! Subjects: publishers that are fed imperatively.
//!
//! A subject is both a [`Publisher`] that any number of subscribers attach to
//! and an input that values are pushed into with [`Subject::send`]. Subjects
//! are hot: a subscriber only sees what is sent after it subscribed, except
//! for [`CurrentValueSubject`], which hands every new subscriber its current
//! value first.
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use rxcombine::prelude::*;
//!
//! let subject = CurrentValueSubject::<i32, Never>::new(0);
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let s = seen.clone();
//! let _token = subject.sink(move |v| s.lock().unwrap().push(v));
//! subject.send(1);
//! assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
//! assert_eq!(subject.value(), 1);
//! ```
//!
//! Both subjects also implement [`Subscriber`](crate::subscriber::Subscriber),
//! so they can be subscribed to another publisher to relay it.

use crate::{publisher::Publisher, subscriber::Completion};

mod current_value_subject;
mod passthrough_subject;
mod subject_core;
mod subject_subscription;
mod subscribers;

pub use current_value_subject::CurrentValueSubject;
pub use passthrough_subject::PassthroughSubject;

/// The input side shared by all subjects.
pub trait Subject: Publisher {
  /// Delivers `value` to every current subscriber that has demand for it.
  /// Ignored once the subject completed.
  fn send(&self, value: Self::Output);

  /// Completes the subject and every current subscriber. Only the first
  /// completion has an effect; later subscribers receive it on subscribe.
  fn send_completion(&self, completion: Completion<Self::Failure>);
}
