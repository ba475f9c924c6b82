//! Gzip plumbing for the wire: streamed compression for downloads and
//! size-capped inflation for uploads.

use std::io::{Read, Write};

use bytes::Bytes;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{ServerError, ServerResult};

/// Incremental gzip encoder that yields compressed frames as they become
/// available, so a download can flow chunk by chunk instead of buffering
/// the whole response.
pub struct GzipChunker {
    encoder: GzEncoder<Vec<u8>>,
}

impl GzipChunker {
    pub fn new() -> Self {
        Self {
            encoder: GzEncoder::new(Vec::new(), Compression::default()),
        }
    }

    /// Compress `data` and drain whatever the encoder has produced so far.
    /// The returned frame may be empty while the encoder buffers.
    pub fn write(&mut self, data: &[u8]) -> std::io::Result<Bytes> {
        self.encoder.write_all(data)?;
        self.encoder.flush()?;
        Ok(Bytes::from(std::mem::take(self.encoder.get_mut())))
    }

    /// Finish the stream and return the trailing frame (checksum included).
    pub fn finish(self) -> std::io::Result<Bytes> {
        Ok(Bytes::from(self.encoder.finish()?))
    }
}

impl Default for GzipChunker {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot compression for small response bodies.
pub fn gzip_all(data: &[u8]) -> std::io::Result<Bytes> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(Bytes::from(encoder.finish()?))
}

/// Inflate a gzip body, refusing anything that expands past `max` bytes.
/// The cap applies to the inflated size, so a small bomb of a part cannot
/// balloon server memory.
pub fn gunzip_limited(data: &[u8], max: usize) -> ServerResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut decoder = GzDecoder::new(data).take(max as u64 + 1);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| ServerError::BadRequest(format!("invalid gzip payload: {e}")))?;
    if out.len() > max {
        // Inflation stops at the cap, so the true size is only a bound.
        return Err(ServerError::BadRequest(format!(
            "upload part inflates to at least {} bytes ({max} max)",
            out.len()
        )));
    }
    Ok(out)
}
