//! Decode progress reporting.
//!
//! The decoder never logs on its own: it reports to a [`DecodeObserver`]
//! handed in by the caller. [`TracingObserver`] forwards to `tracing`;
//! [`NoopObserver`] discards everything.

use std::path::Path;
use tracing::{debug, error, info};

use crate::decoder::DecodeSummary;
use crate::error::DecodeError;
use crate::header::ArchiveHeader;
use crate::index::{ChunkIndex, ChunkIndexEntry};

pub trait DecodeObserver {
    fn on_header(&mut self, _header: &ArchiveHeader) {}
    fn on_index_entry(&mut self, _index: usize, _entry: &ChunkIndexEntry) {}
    fn on_index(&mut self, _index: &ChunkIndex) {}
    fn on_chunk(&mut self, _index: usize, _entry: &ChunkIndexEntry, _decoded: usize) {}
    fn on_complete(&mut self, _destination: &Path, _summary: &DecodeSummary) {}
    fn on_failure(&mut self, _error: &DecodeError) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl DecodeObserver for NoopObserver {}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DecodeObserver for TracingObserver {
    fn on_header(&mut self, h: &ArchiveHeader) {
        info!(
            chunk_unit_size = h.chunk_unit_size,
            packed_size     = h.packed_size,
            unpacked_size   = h.unpacked_size,
            "archive is valid"
        );
    }

    fn on_index_entry(&mut self, index: usize, e: &ChunkIndexEntry) {
        debug!(index, compressed = e.compressed_size, uncompressed = e.uncompressed_size, "index entry");
    }

    fn on_index(&mut self, idx: &ChunkIndex) {
        debug!(chunks = idx.len(), size_indexed = idx.size_indexed, "index built");
    }

    fn on_chunk(&mut self, index: usize, e: &ChunkIndexEntry, decoded: usize) {
        debug!(index, compressed = e.compressed_size, decoded, "chunk decoded");
    }

    fn on_complete(&mut self, destination: &Path, s: &DecodeSummary) {
        info!(
            destination = %destination.display(),
            chunks      = s.chunk_count,
            bytes       = s.bytes_written,
            "archive has been successfully extracted"
        );
    }

    fn on_failure(&mut self, err: &DecodeError) {
        error!(error = %err, "decode failed");
    }
}

/// Records every callback; used by tests to check what was reported.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingObserver {
    pub events: Vec<String>,
}

#[cfg(test)]
impl DecodeObserver for RecordingObserver {
    fn on_header(&mut self, h: &ArchiveHeader) {
        self.events.push(format!("header {}", h.unpacked_size));
    }
    fn on_index_entry(&mut self, index: usize, _: &ChunkIndexEntry) {
        self.events.push(format!("entry {index}"));
    }
    fn on_index(&mut self, idx: &ChunkIndex) {
        self.events.push(format!("index {}", idx.len()));
    }
    fn on_chunk(&mut self, index: usize, _: &ChunkIndexEntry, decoded: usize) {
        self.events.push(format!("chunk {index} {decoded}"));
    }
    fn on_complete(&mut self, _: &Path, s: &DecodeSummary) {
        self.events.push(format!("complete {}", s.bytes_written));
    }
    fn on_failure(&mut self, e: &DecodeError) {
        self.events.push(format!("failure {e}"));
    }
}
