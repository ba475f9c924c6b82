//! Canonicalization and content addressing of incoming objects.
//!
//! An incoming object is an arbitrary JSON mapping, optionally carrying two
//! transient fields that are never persisted: `__closure` (a map of
//! descendant id to minimum depth, declared by the client) and `__tree`
//! (client-side bookkeeping, ignored here). [`prepare`] strips both, settles
//! the object's id, and derives the aggregate children counts.
//!
//! The digest is computed over the payload's serialized bytes with key
//! insertion order preserved -- keys are deliberately *not* sorted, so two
//! payloads differing only in field order get different ids. A
//! client-supplied `id` is honored verbatim without re-verification unless
//! the caller opts into [`PrepareOptions::verify_ids`].

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::{Map, Value};
use strata_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::record::{ClosureEdge, ObjectRecord};

/// Transient field naming the declared descendant closure.
pub const CLOSURE_FIELD: &str = "__closure";
/// Transient client bookkeeping field, stripped and ignored.
pub const TREE_FIELD: &str = "__tree";

/// Hard cap on a single object's serialized size.
pub const DEFAULT_MAX_OBJECT_BYTES: usize = 10 * 1024 * 1024;

/// Knobs for [`prepare`].
#[derive(Clone, Copy, Debug)]
pub struct PrepareOptions {
    /// Maximum serialized payload size in bytes.
    pub max_object_bytes: usize,
    /// Recompute the digest for objects that carried an `id` and reject
    /// mismatches. Off by default: client ids are trusted verbatim.
    pub verify_ids: bool,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            max_object_bytes: DEFAULT_MAX_OBJECT_BYTES,
            verify_ids: false,
        }
    }
}

/// The output of canonicalization: a persistable record plus the closure
/// edges derived from the object's declared descendants.
#[derive(Clone, Debug)]
pub struct PreparedObject {
    pub record: ObjectRecord,
    pub closures: Vec<ClosureEdge>,
}

impl PreparedObject {
    pub fn id(&self) -> &ObjectId {
        &self.record.id
    }
}

/// Canonicalize one raw object for storage.
pub fn prepare(raw: Value, opts: &PrepareOptions) -> StoreResult<PreparedObject> {
    let Value::Object(mut data) = raw else {
        return Err(StoreError::MalformedObject(
            "payload is not a JSON object".into(),
        ));
    };

    data.remove(TREE_FIELD);
    let declared = extract_closure(data.remove(CLOSURE_FIELD))?;

    let id = settle_id(&mut data, opts)?;

    let serialized_len = serialized_size(&data)?;
    if serialized_len > opts.max_object_bytes {
        return Err(StoreError::ObjectTooLarge {
            size: serialized_len,
            max: opts.max_object_bytes,
        });
    }

    let mut closures = Vec::with_capacity(declared.len());
    let mut by_depth: BTreeMap<u32, u64> = BTreeMap::new();
    for (child, min_depth) in declared {
        *by_depth.entry(min_depth).or_insert(0) += 1;
        closures.push(ClosureEdge {
            parent: id.clone(),
            child,
            min_depth,
        });
    }

    let record = ObjectRecord {
        id,
        speckle_type: string_field(&data, "speckleType").unwrap_or_else(|| "Base".into()),
        total_children_count: closures.len() as u64,
        total_children_count_by_depth: by_depth,
        author: string_field(&data, "author"),
        description: string_field(&data, "description"),
        application_id: string_field(&data, "applicationId"),
        created_at: Utc::now(),
        data,
    };

    Ok(PreparedObject { record, closures })
}

/// Settle the object's id: honor a client-supplied one, otherwise digest
/// the payload (which at this point excludes `id` and the transient
/// fields) and append the computed id to the payload.
fn settle_id(data: &mut Map<String, Value>, opts: &PrepareOptions) -> StoreResult<ObjectId> {
    match data.get("id") {
        Some(Value::String(declared)) => {
            let id = ObjectId::parse(declared)?;
            if opts.verify_ids {
                let computed = digest_without_id(data)?;
                if computed != id {
                    return Err(StoreError::IdMismatch {
                        declared: id.into_string(),
                        computed: computed.into_string(),
                    });
                }
            }
            Ok(id)
        }
        Some(other) => Err(StoreError::MalformedObject(format!(
            "id field must be a string, got {other}"
        ))),
        None => {
            let id = digest_map(data)?;
            data.insert("id".into(), Value::String(id.as_str().to_owned()));
            Ok(id)
        }
    }
}

fn digest_map(data: &Map<String, Value>) -> StoreResult<ObjectId> {
    let bytes =
        serde_json::to_vec(data).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(ObjectId::from_data(&bytes))
}

/// Digest the payload as it would have looked before an id was assigned.
fn digest_without_id(data: &Map<String, Value>) -> StoreResult<ObjectId> {
    let mut without_id = data.clone();
    without_id.remove("id");
    digest_map(&without_id)
}

fn serialized_size(data: &Map<String, Value>) -> StoreResult<usize> {
    serde_json::to_vec(data)
        .map(|b| b.len())
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Parse the `__closure` field into `(child, min_depth)` pairs.
fn extract_closure(value: Option<Value>) -> StoreResult<Vec<(ObjectId, u32)>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let map = match value {
        Value::Object(map) => map,
        Value::Null => return Ok(Vec::new()),
        _ => {
            return Err(StoreError::MalformedObject(format!(
                "{CLOSURE_FIELD} must be a map of id to depth"
            )))
        }
    };
    let mut pairs = Vec::with_capacity(map.len());
    for (child, depth) in map {
        let depth = depth.as_u64().and_then(|d| u32::try_from(d).ok()).ok_or_else(|| {
            StoreError::MalformedObject(format!(
                "{CLOSURE_FIELD} depth for {child} is not a non-negative integer"
            ))
        })?;
        pairs.push((ObjectId::parse(&child)?, depth));
    }
    Ok(pairs)
}

fn string_field(data: &Map<String, Value>, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_owned)
}
