//! The model hub metadata layer.
//!
//! This crate resolves a `(model_id, version constraint)` pair to validated
//! model metadata, backed by manifest and spec JSON documents hosted in an
//! object-storage bucket. Fetches go through two bounded, expiring caches: a
//! raw-content cache holding parsed manifest/spec documents, and a
//! resolution cache mapping version constraints to concrete versions. The
//! manifest is re-downloaded only when its remote content hash changes.

#![warn(missing_docs)]

mod error;
mod metadata;
mod registry;
mod resolve;
mod types;

pub use error::*;
pub use metadata::*;
pub use registry::*;
pub use types::*;
