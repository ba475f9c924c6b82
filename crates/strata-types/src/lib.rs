//! Core identifier types for the Strata object substrate.
//!
//! Every stored object is identified by an [`ObjectId`] -- the hex-encoded
//! content digest of its serialized payload. All storage operations are
//! scoped to a [`StreamId`], the tenant partition boundary: the same digest
//! in two streams refers to two independent rows.

pub mod error;
pub mod id;
pub mod stream;

pub use error::TypeError;
pub use id::ObjectId;
pub use stream::StreamId;
