//! Per-chunk decompression.
//!
//! Every chunk is an independent zlib stream (RFC 1950 header, deflate body,
//! Adler-32 trailer). The [`ChunkCodec`] trait is the seam between the
//! decoder and the inflate primitive; [`ZlibCodec`] is the only built-in
//! implementation.

use flate2::{Decompress, FlushDecompress, Status};
use thiserror::Error;

/// Upper bound on any allocation sized from an untrusted index entry. Buffers
/// still grow past this as real data arrives.
pub const MAX_PREALLOC: usize = 16 * 1024 * 1024;

const GROW_STEP: usize = 32 * 1024;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Decompression error: {0}")]
    Decompression(String),
    /// Input ran out before the zlib stream signalled its end.
    #[error("Truncated zlib stream after {consumed} of {available} input bytes")]
    Truncated { consumed: u64, available: usize },
}

pub trait ChunkCodec: Send + Sync {
    /// Inflate one chunk, producing at most `limit` bytes. Output is cut off
    /// at `limit` without reading the rest of the stream, so a caller that
    /// passes `expected + 1` learns the chunk is too long without inflating
    /// all of it.
    fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, CodecError>;
}

pub struct ZlibCodec;

impl ChunkCodec for ZlibCodec {
    fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, CodecError> {
        let mut z   = Decompress::new(true);
        let mut out = Vec::with_capacity(limit.min(MAX_PREALLOC));

        while out.len() < limit {
            if out.len() == out.capacity() {
                out.reserve(GROW_STEP.min(limit - out.len()));
            }
            let in_before  = z.total_in();
            let out_before = z.total_out();

            let status = z
                .decompress_vec(&data[in_before as usize..], &mut out, FlushDecompress::None)
                .map_err(|e| CodecError::Decompression(e.to_string()))?;

            if status == Status::StreamEnd {
                out.truncate(limit);
                return Ok(out);
            }
            // There was spare output room, so no progress means no more input.
            if z.total_in() == in_before && z.total_out() == out_before {
                return Err(CodecError::Truncated { consumed: z.total_in(), available: data.len() });
            }
        }
        out.truncate(limit);
        Ok(out)
    }
}

/// The codec used for every chunk of an Atlas archive.
pub fn default_codec() -> Box<dyn ChunkCodec> {
    Box::new(ZlibCodec)
}
