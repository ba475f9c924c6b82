use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use strata_store::{prepare, ObjectStore, PrepareOptions, PreparedObject};
use strata_types::{ObjectId, StreamId};
use tokio::task::JoinSet;

use crate::error::{IngestError, IngestResult};

/// Default maximum number of objects per storage batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 250;
/// Default number of batches dispatched concurrently per wave.
pub const DEFAULT_WAVE_WIDTH: usize = 4;

/// Pipeline tuning knobs.
#[derive(Clone, Copy, Debug)]
pub struct IngestConfig {
    /// Objects per batch; one batch is one bulk write.
    pub max_batch_size: usize,
    /// Batches in flight per wave. A new wave is admitted only after the
    /// prior wave has fully settled.
    pub wave_width: usize,
    /// Per-batch deadline covering canonicalization and the bulk write.
    pub batch_timeout: Duration,
    /// Canonicalizer options (size cap, optional id verification).
    pub prepare: PrepareOptions,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            wave_width: DEFAULT_WAVE_WIDTH,
            batch_timeout: Duration::from_secs(60),
            prepare: PrepareOptions::default(),
        }
    }
}

/// Batched, wave-gated object ingestion.
pub struct Ingester {
    store: Arc<dyn ObjectStore>,
    config: IngestConfig,
}

impl Ingester {
    pub fn new(store: Arc<dyn ObjectStore>, config: IngestConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Ingest a sequence of raw objects into one stream.
    ///
    /// Returns the stored ids in input order. On failure the error names
    /// the offending batch; batches committed before the failure stay
    /// committed (uploads are at-least-once per batch, not all-or-nothing).
    pub async fn ingest(
        &self,
        stream: &StreamId,
        objects: Vec<Value>,
    ) -> IngestResult<Vec<ObjectId>> {
        if objects.is_empty() {
            return Ok(Vec::new());
        }

        let batch_size = self.config.max_batch_size.max(1);
        let wave_width = self.config.wave_width.max(1);

        let mut batches: Vec<Vec<Value>> = Vec::new();
        let mut objects = objects;
        while objects.len() > batch_size {
            let rest = objects.split_off(batch_size);
            batches.push(std::mem::replace(&mut objects, rest));
        }
        batches.push(objects);

        let batch_count = batches.len();
        let mut ids_by_batch: Vec<Vec<ObjectId>> = vec![Vec::new(); batch_count];

        let mut pending = batches.into_iter().enumerate();
        loop {
            let wave: Vec<(usize, Vec<Value>)> = pending.by_ref().take(wave_width).collect();
            if wave.is_empty() {
                break;
            }

            let mut tasks = JoinSet::new();
            for (index, batch) in wave {
                let store = Arc::clone(&self.store);
                let stream = stream.clone();
                let config = self.config;
                tasks.spawn(async move {
                    let outcome = run_batch(store, stream, index, batch, config).await;
                    (index, outcome)
                });
            }

            // Wave barrier: every task of this wave settles before the next
            // wave is admitted. A failure stops admission but still drains
            // the wave so no write is left untracked.
            let mut failure: Option<IngestError> = None;
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((index, Ok(ids))) => ids_by_batch[index] = ids,
                    Ok((_, Err(err))) => failure = Some(failure.take().unwrap_or(err)),
                    Err(err) => {
                        failure =
                            Some(failure.take().unwrap_or(IngestError::Join(err.to_string())));
                    }
                }
            }
            if let Some(err) = failure {
                return Err(err);
            }
        }

        Ok(ids_by_batch.into_iter().flatten().collect())
    }
}

impl std::fmt::Debug for Ingester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingester")
            .field("config", &self.config)
            .finish()
    }
}

async fn run_batch(
    store: Arc<dyn ObjectStore>,
    stream: StreamId,
    index: usize,
    batch: Vec<Value>,
    config: IngestConfig,
) -> IngestResult<Vec<ObjectId>> {
    let started = Instant::now();
    let object_count = batch.len();

    let work = tokio::task::spawn_blocking(move || -> Result<_, strata_store::StoreError> {
        let mut prepared: Vec<PreparedObject> = Vec::with_capacity(batch.len());
        for raw in batch {
            prepared.push(prepare(raw, &config.prepare)?);
        }
        let edge_count: usize = prepared.iter().map(|p| p.closures.len()).sum();
        let ids = store.put_many(&stream, prepared)?;
        Ok((ids, edge_count))
    });

    let joined = tokio::time::timeout(config.batch_timeout, work)
        .await
        .map_err(|_| IngestError::Timeout {
            index,
            seconds: config.batch_timeout.as_secs(),
        })?
        .map_err(|e| IngestError::Join(e.to_string()))?;

    match joined {
        Ok((ids, edge_count)) => {
            tracing::debug!(
                batch = index,
                objects = object_count,
                edges = edge_count,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "stored batch"
            );
            Ok(ids)
        }
        Err(source) => Err(IngestError::Batch { index, source }),
    }
}
