use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strata_types::ObjectId;

/// A persisted object row.
///
/// `data` holds the full client payload (with transient fields stripped and
/// the `id` field present), key order preserved. The remaining columns are
/// denormalized from the payload at ingestion time so traversal queries
/// never have to open `data`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub id: ObjectId,
    /// Type discriminator (e.g. `"commit"`). Defaults to `"Base"`.
    #[serde(rename = "speckleType")]
    pub speckle_type: String,
    #[serde(rename = "totalChildrenCount")]
    pub total_children_count: u64,
    /// Histogram of declared descendants by minimum depth.
    #[serde(rename = "totalChildrenCountByDepth")]
    pub total_children_count_by_depth: BTreeMap<u32, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "applicationId", skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// Full serialized payload, insertion order preserved.
    pub data: serde_json::Map<String, serde_json::Value>,
}

/// One row of the closure index: `child` is reachable from `parent` at
/// `min_depth` hops, as declared by the uploading client.
///
/// Unique on `(parent, child)`; the first write for a pair wins. The server
/// never re-walks the graph to verify these edges.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureEdge {
    pub parent: ObjectId,
    pub child: ObjectId,
    #[serde(rename = "minDepth")]
    pub min_depth: u32,
}
