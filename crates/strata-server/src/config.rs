use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strata_ingest::IngestConfig;
use strata_store::PrepareOptions;

use crate::error::{ServerError, ServerResult};

fn default_bind_addr() -> SocketAddr {
    "127.0.0.1:3000".parse().expect("static addr")
}

fn default_max_part_size() -> usize {
    100 * 1024 * 1024
}

fn default_max_object_size() -> usize {
    strata_store::DEFAULT_MAX_OBJECT_BYTES
}

fn default_max_batch_size() -> usize {
    strata_ingest::DEFAULT_MAX_BATCH_SIZE
}

fn default_wave_width() -> usize {
    strata_ingest::DEFAULT_WAVE_WIDTH
}

fn default_batch_timeout_secs() -> u64 {
    60
}

fn default_download_chunk_size() -> usize {
    1000
}

fn default_chunk_timeout_secs() -> u64 {
    60
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Per multipart part, after gzip inflation.
    pub max_part_size: usize,
    /// Per object, measured on its canonical serialization.
    pub max_object_size: usize,
    pub max_batch_size: usize,
    pub wave_width: usize,
    pub batch_timeout_secs: u64,
    /// Rows per streamed download chunk.
    pub download_chunk_size: usize,
    /// Deadline for handing one download chunk to the client.
    pub chunk_timeout_secs: u64,
    /// Recompute digests for client-supplied ids and reject mismatches.
    /// Off by default: ids inside the trust boundary are honored verbatim.
    pub verify_ids: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_part_size: default_max_part_size(),
            max_object_size: default_max_object_size(),
            max_batch_size: default_max_batch_size(),
            wave_width: default_wave_width(),
            batch_timeout_secs: default_batch_timeout_secs(),
            download_chunk_size: default_download_chunk_size(),
            chunk_timeout_secs: default_chunk_timeout_secs(),
            verify_ids: false,
        }
    }
}

impl ServerConfig {
    /// Load from a TOML file; absent keys fall back to defaults.
    pub fn from_file(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            max_batch_size: self.max_batch_size,
            wave_width: self.wave_width,
            batch_timeout: Duration::from_secs(self.batch_timeout_secs),
            prepare: PrepareOptions {
                max_object_bytes: self.max_object_size,
                verify_ids: self.verify_ids,
            },
        }
    }

    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(c.max_part_size, 100 * 1024 * 1024);
        assert_eq!(c.max_object_size, 10 * 1024 * 1024);
        assert_eq!(c.max_batch_size, 250);
        assert_eq!(c.download_chunk_size, 1000);
        assert!(!c.verify_ids);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let c: ServerConfig = toml::from_str("wave_width = 8\n").unwrap();
        assert_eq!(c.wave_width, 8);
        assert_eq!(c.max_batch_size, 250);
    }

    #[test]
    fn ingest_config_inherits_limits() {
        let mut c = ServerConfig::default();
        c.max_object_size = 512;
        c.verify_ids = true;
        let ingest = c.ingest_config();
        assert_eq!(ingest.prepare.max_object_bytes, 512);
        assert!(ingest.prepare.verify_ids);
    }
}
