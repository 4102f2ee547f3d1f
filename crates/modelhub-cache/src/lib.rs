//! The generic caching primitive underneath the model metadata layer.
//!
//! [`BoundedCache`] is a size-bounded, time-bounded mapping that refreshes
//! entries through a caller-supplied retrieval function. It is deliberately
//! free of any domain knowledge and does no I/O of its own.

#![warn(missing_docs)]

mod bounded;

pub use bounded::*;

#[cfg(any(test, feature = "test"))]
pub(crate) use tokio::time;

#[cfg(not(any(test, feature = "test")))]
pub(crate) use std::time;
