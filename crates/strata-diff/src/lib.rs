//! Diff engine: partition a candidate id set into present and missing.
//!
//! Clients use this before uploading to skip content the server already
//! stores -- the incremental-sync half of content addressing. The result
//! covers every requested id; absence is an answer, never an error.

pub mod error;

use std::collections::BTreeMap;
use std::sync::Arc;

use strata_store::ObjectStore;
use strata_types::{ObjectId, StreamId};

pub use error::{DiffError, DiffResult};

/// Ids are checked against the store in chunks of this size so arbitrarily
/// long candidate lists keep bounded query footprints.
pub const DIFF_CHUNK_SIZE: usize = 1000;

/// Which candidate ids are already stored in one stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiffReport {
    /// `id -> present` for every requested id.
    pub presence: BTreeMap<ObjectId, bool>,
}

impl DiffReport {
    /// Ids the client does not need to upload again.
    pub fn present(&self) -> impl Iterator<Item = &ObjectId> {
        self.presence.iter().filter(|(_, &p)| p).map(|(id, _)| id)
    }

    /// Ids the server has never seen.
    pub fn missing(&self) -> impl Iterator<Item = &ObjectId> {
        self.presence.iter().filter(|(_, &p)| !p).map(|(id, _)| id)
    }
}

/// Partition `candidates` into present/missing against one stream's store.
pub fn diff(
    store: &Arc<dyn ObjectStore>,
    stream: &StreamId,
    candidates: &[ObjectId],
) -> DiffResult<DiffReport> {
    let mut report = DiffReport::default();
    for chunk in candidates.chunks(DIFF_CHUNK_SIZE) {
        let presence = store.has_many(stream, chunk)?;
        report.presence.extend(presence);
    }
    Ok(report)
}
