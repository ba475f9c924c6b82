//! Batched ingestion pipeline for the Strata object store.
//!
//! Transforms an unbounded, client-supplied sequence of raw JSON objects
//! into bounded, dedup-safe, closure-indexed storage writes. Objects are
//! split into batches (250 by default); batches are dispatched in *waves*
//! of bounded width, and a new wave is not admitted until every task of the
//! prior wave has settled. This caps memory use for very large uploads
//! while still overlapping batch I/O.
//!
//! Uploads are not atomic: a failing batch aborts only itself, and batches
//! already committed stay committed. Callers decide whether to retry a
//! partially ingested upload.

pub mod error;
pub mod pipeline;

pub use error::{IngestError, IngestResult};
pub use pipeline::{IngestConfig, Ingester, DEFAULT_MAX_BATCH_SIZE, DEFAULT_WAVE_WIDTH};
