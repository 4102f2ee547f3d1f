//! Object-storage backends for the model hub metadata cache.
//!
//! The metadata layer only ever issues two kinds of storage requests: a
//! metadata probe for an object's content hash, and a full download. The
//! [`ObjectStore`] trait captures exactly that contract, with an S3-backed
//! implementation for production and a filesystem-backed one for local use
//! and tests.

#![warn(missing_docs)]

mod filesystem;
mod regions;
mod s3;
mod store;

pub use filesystem::*;
pub use regions::*;
pub use s3::*;
pub use store::*;
