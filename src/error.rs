use std::io;
use thiserror::Error;

use crate::codec::CodecError;

/// Every way a decode can fail. The first failure aborts the whole decode.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Invalid signature: {found}")]
    InvalidSignature { found: i64 },
    #[error("Header-Index mismatch: header declares {declared} unpacked bytes, index sums to {indexed}")]
    HeaderIndexMismatch { declared: i64, indexed: i64 },
    #[error("Uncompressed size mismatch at index {index}: expected {expected}, got {actual}")]
    ChunkSizeMismatch { index: usize, expected: i64, actual: usize },
    #[error("Corrupt data in chunk {index}: {source}")]
    CorruptData {
        index:  usize,
        #[source]
        source: CodecError,
    },
    #[error("Invalid compressed length {length} at index {index}")]
    InvalidChunkLength { index: usize, length: i64 },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl DecodeError {
    /// Chunk position the error refers to, if any.
    pub fn chunk_index(&self) -> Option<usize> {
        match self {
            DecodeError::ChunkSizeMismatch { index, .. }
            | DecodeError::CorruptData { index, .. }
            | DecodeError::InvalidChunkLength { index, .. } => Some(*index),
            _ => None,
        }
    }
}
