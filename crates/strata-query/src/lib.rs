//! Paginated, depth-bounded child queries over the Strata closure index.
//!
//! Retrieval never walks nested structures: the closure index already
//! flattens every (ancestor, descendant, depth) relationship, so a subtree
//! query is a range scan joined against the objects table. Two modes:
//!
//! - [`ChildQueryEngine::children`] -- simple id-ordered paging with
//!   optional dotted-path projection.
//! - [`ChildQueryEngine::children_filtered`] -- whitelisted predicates,
//!   a single user ordering, and opaque keyset cursors.

pub mod cursor;
pub mod engine;
pub mod error;
pub mod path;
pub mod predicate;

pub use cursor::CursorToken;
pub use engine::{
    ChildQueryEngine, FilteredChildQuery, FilteredPage, SimpleChildQuery, SimplePage,
    DEFAULT_DEPTH, DEFAULT_LIMIT,
};
pub use error::{QueryError, QueryResult};
pub use predicate::{compare_values, eval_all, Direction, OrderBy, Operator, Predicate, Verb};
