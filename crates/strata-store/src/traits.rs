use std::collections::BTreeMap;

use strata_types::{ObjectId, StreamId};

use crate::canonical::PreparedObject;
use crate::error::StoreResult;
use crate::record::ObjectRecord;

/// A page of children read through the closure index.
#[derive(Clone, Debug, Default)]
pub struct ChildPage {
    /// Matching child records, ascending by id.
    pub records: Vec<ObjectRecord>,
    /// Declared minimum depth for each record, parallel to `records`.
    pub min_depths: Vec<u32>,
}

/// Tenant-scoped, deduplicated key-value storage for objects plus the
/// persisted closure index.
///
/// All implementations must satisfy these invariants:
/// - Objects are write-once. A put for an existing id is a no-op, so
///   concurrent re-ingestion of the same content is safe and commutative.
/// - Every closure edge is unique on `(parent, child)`; the first write
///   wins and later depths are ignored.
/// - Reads never invent rows: `get_many` returns only the existing subset
///   and reports nothing for absent ids.
/// - Streams are fully isolated; no operation can cross tenants.
pub trait ObjectStore: Send + Sync {
    /// Write one prepared object and its closure edges. Returns the id.
    fn put(&self, stream: &StreamId, object: PreparedObject) -> StoreResult<ObjectId> {
        Ok(self.put_many(stream, vec![object])?.remove(0))
    }

    /// Bulk-write a batch of prepared objects and all their closure edges.
    ///
    /// The returned ids match the input order. Conflicting rows are
    /// skipped, never updated.
    fn put_many(
        &self,
        stream: &StreamId,
        objects: Vec<PreparedObject>,
    ) -> StoreResult<Vec<ObjectId>>;

    /// Fetch one object. `Ok(None)` if it does not exist.
    fn get(&self, stream: &StreamId, id: &ObjectId) -> StoreResult<Option<ObjectRecord>>;

    /// Fetch the existing subset of `ids`, ascending by id. Absent ids are
    /// silently omitted.
    fn get_many(&self, stream: &StreamId, ids: &[ObjectId]) -> StoreResult<Vec<ObjectRecord>>;

    /// Existence map covering every requested id.
    fn has_many(
        &self,
        stream: &StreamId,
        ids: &[ObjectId],
    ) -> StoreResult<BTreeMap<ObjectId, bool>>;

    /// Page through the descendants of `parent` with declared
    /// `min_depth < depth`, joined against the objects table, ascending by
    /// child id. `after` is an exclusive lower bound (keyset cursor);
    /// `limit` caps the page size.
    fn children(
        &self,
        stream: &StreamId,
        parent: &ObjectId,
        depth: u32,
        after: Option<&ObjectId>,
        limit: usize,
    ) -> StoreResult<ChildPage>;
}
