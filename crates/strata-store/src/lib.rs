//! Content-addressed, closure-indexed object storage for Strata.
//!
//! Clients persist arbitrarily large, deeply nested data graphs as flat
//! sets of JSON objects. Every object is keyed by the digest of its
//! serialized payload, which makes writes idempotent and existence checks
//! cheap. Alongside each object the client declares its transitive
//! descendants (the `__closure` map); those declarations are persisted as a
//! closure index so subtree queries at arbitrary depth never walk nested
//! structures server-side.
//!
//! # Design Rules
//!
//! 1. Objects are write-once; a conflicting put is a no-op.
//! 2. Closure edges are unique on `(parent, child)`; first write wins.
//! 3. The digest preserves key insertion order -- no canonical sort.
//! 4. Client-supplied ids and closures are trusted, not re-verified
//!    (opt-in verification via [`PrepareOptions::verify_ids`]).
//! 5. Every operation is scoped to one stream; tenants cannot interact.

pub mod canonical;
pub mod error;
pub mod memory;
pub mod record;
pub mod traits;

pub use canonical::{
    prepare, PrepareOptions, PreparedObject, CLOSURE_FIELD, DEFAULT_MAX_OBJECT_BYTES, TREE_FIELD,
};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use record::{ClosureEdge, ObjectRecord};
pub use traits::{ChildPage, ObjectStore};
