//! Archive decoding pipeline.
//!
//! [`AtlasReader::with_observer`] reads the header and the chunk index and
//! cross-checks them; [`AtlasReader::decode_all`] then reads and inflates
//! every chunk in index order, checking each against its entry. The whole
//! output is held in memory and only handed to the destination once every
//! chunk has succeeded.
//!
//! # Persistence
//! [`decode_with`] writes the output to a temporary file next to the
//! destination and renames it into place. A failed decode never creates or
//! truncates the destination, and the temporary file is removed on every
//! error path.
//!
//! # Parallel decompression
//! With the `parallel` feature, payloads are still read sequentially (the
//! source is a single forward stream) but inflated on the rayon pool. Results
//! are reassembled in index order and the reported error is the same one the
//! sequential path would report.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::codec::{default_codec, ChunkCodec, MAX_PREALLOC};
use crate::error::DecodeError;
use crate::header::{ArchiveHeader, HEADER_SIZE};
use crate::index::{ChunkIndex, ChunkIndexEntry, ENTRY_SIZE};
use crate::observer::{DecodeObserver, NoopObserver, TracingObserver};

// ── Options / results ────────────────────────────────────────────────────────

/// Configuration for [`decode_with`].
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Replace an existing destination. When false an existing destination
    /// fails the decode with `AlreadyExists` before the source is opened.
    pub overwrite: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self { overwrite: true }
    }
}

/// Totals reported after a successful decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeSummary {
    pub chunk_count:     usize,
    pub chunk_unit_size: i64,
    pub packed_size:     i64,
    pub unpacked_size:   i64,
    /// Compressed bytes actually consumed from the chunk area.
    pub compressed_read: u64,
    pub bytes_written:   u64,
}

/// Header and index of an archive, without any chunk data.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveInfo {
    pub header:           ArchiveHeader,
    pub chunk_count:      usize,
    pub total_compressed: i64,
    /// Byte offset of the first chunk payload.
    pub data_offset:      u64,
    pub entries:          Vec<ChunkIndexEntry>,
}

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct AtlasReader<R: Read> {
    reader:          R,
    pub header:      ArchiveHeader,
    pub index:       ChunkIndex,
    codec:           Box<dyn ChunkCodec>,
    compressed_read: u64,
}

impl<R: Read> AtlasReader<R> {
    pub fn new(reader: R) -> Result<Self, DecodeError> {
        Self::with_observer(reader, &mut NoopObserver)
    }

    /// Read and validate the header, then build and cross-check the index.
    /// The stream is left positioned at the first chunk payload.
    pub fn with_observer(mut reader: R, observer: &mut dyn DecodeObserver) -> Result<Self, DecodeError> {
        let header = ArchiveHeader::read(&mut reader)?;
        observer.on_header(&header);

        let index = ChunkIndex::read(&mut reader, header.unpacked_size, |i, e| {
            observer.on_index_entry(i, e)
        })?;
        observer.on_index(&index);

        Ok(Self {
            reader,
            header,
            index,
            codec: default_codec(),
            compressed_read: 0,
        })
    }

    pub fn info(&self) -> ArchiveInfo {
        ArchiveInfo {
            header:           self.header,
            chunk_count:      self.index.len(),
            total_compressed: self.index.total_compressed(),
            data_offset:      (HEADER_SIZE + ENTRY_SIZE * self.index.len()) as u64,
            entries:          self.index.entries.clone(),
        }
    }

    /// Read and inflate every chunk, returning the concatenated output.
    #[cfg(not(feature = "parallel"))]
    pub fn decode_all(&mut self, observer: &mut dyn DecodeObserver) -> Result<Vec<u8>, DecodeError> {
        let mut out = Vec::with_capacity(output_capacity(self.header.unpacked_size));

        for (i, entry) in self.index.entries.iter().enumerate() {
            let payload = read_payload(&mut self.reader, i, entry)?;
            self.compressed_read += payload.len() as u64;

            let chunk = inflate_chunk(self.codec.as_ref(), i, entry, &payload)?;
            observer.on_chunk(i, entry, chunk.len());
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    /// Read and inflate every chunk, returning the concatenated output.
    #[cfg(feature = "parallel")]
    pub fn decode_all(&mut self, observer: &mut dyn DecodeObserver) -> Result<Vec<u8>, DecodeError> {
        use rayon::prelude::*;

        let entries = &self.index.entries;

        // A read failure is held back: an earlier chunk that fails to inflate
        // is what the sequential path would have reported first.
        let mut payloads   = Vec::with_capacity(entries.len());
        let mut read_error = None;
        for (i, entry) in entries.iter().enumerate() {
            match read_payload(&mut self.reader, i, entry) {
                Ok(p) => {
                    self.compressed_read += p.len() as u64;
                    payloads.push(p);
                }
                Err(e) => {
                    read_error = Some(e);
                    break;
                }
            }
        }

        let codec = self.codec.as_ref();
        let results: Vec<Result<Vec<u8>, DecodeError>> = payloads
            .par_iter()
            .enumerate()
            .map(|(i, payload)| inflate_chunk(codec, i, &entries[i], payload))
            .collect();

        let mut out = Vec::with_capacity(output_capacity(self.header.unpacked_size));
        for (i, r) in results.into_iter().enumerate() {
            let chunk = r?;
            observer.on_chunk(i, &entries[i], chunk.len());
            out.extend_from_slice(&chunk);
        }
        match read_error {
            Some(e) => Err(e),
            None    => Ok(out),
        }
    }

    pub fn summary(&self, bytes_written: usize) -> DecodeSummary {
        DecodeSummary {
            chunk_count:     self.index.len(),
            chunk_unit_size: self.header.chunk_unit_size,
            packed_size:     self.header.packed_size,
            unpacked_size:   self.header.unpacked_size,
            compressed_read: self.compressed_read,
            bytes_written:   bytes_written as u64,
        }
    }
}

// ── Chunk helpers ────────────────────────────────────────────────────────────

fn output_capacity(declared: i64) -> usize {
    usize::try_from(declared).unwrap_or(0).min(MAX_PREALLOC)
}

/// Read exactly `compressed_size` bytes. The buffer grows with the data
/// actually present rather than the declared size.
fn read_payload<R: Read>(reader: &mut R, index: usize, entry: &ChunkIndexEntry) -> Result<Vec<u8>, DecodeError> {
    let len = u64::try_from(entry.compressed_size).map_err(|_| DecodeError::InvalidChunkLength {
        index,
        length: entry.compressed_size,
    })?;

    let mut payload = Vec::with_capacity(usize::try_from(len).unwrap_or(usize::MAX).min(MAX_PREALLOC));
    reader.by_ref().take(len).read_to_end(&mut payload)?;

    if payload.len() as u64 != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("chunk {index}: expected {len} compressed bytes, found {}", payload.len()),
        )
        .into());
    }
    Ok(payload)
}

/// Inflate one chunk and check its length. A chunk longer than declared is
/// cut off one byte past the declared size, so `actual` is then
/// `expected + 1`.
fn inflate_chunk(
    codec:   &dyn ChunkCodec,
    index:   usize,
    entry:   &ChunkIndexEntry,
    payload: &[u8],
) -> Result<Vec<u8>, DecodeError> {
    // One byte past the declared size is enough to prove a mismatch; a
    // negative declared size can never match, so nothing is inflated.
    let limit = match usize::try_from(entry.uncompressed_size) {
        Ok(n)  => n.saturating_add(1),
        Err(_) if entry.uncompressed_size < 0 => 0,
        Err(_) => usize::MAX,
    };
    let data = codec
        .decompress(payload, limit)
        .map_err(|source| DecodeError::CorruptData { index, source })?;

    if i64::try_from(data.len()).ok() != Some(entry.uncompressed_size) {
        return Err(DecodeError::ChunkSizeMismatch {
            index,
            expected: entry.uncompressed_size,
            actual:   data.len(),
        });
    }
    Ok(data)
}

// ── Persistence ──────────────────────────────────────────────────────────────

fn persist(destination: &Path, data: &[u8], overwrite: bool) -> io::Result<()> {
    let dir = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;

    if overwrite {
        tmp.persist(destination).map_err(|e| e.error)?;
    } else {
        tmp.persist_noclobber(destination).map_err(|e| e.error)?;
    }
    Ok(())
}

// ── Entry points ─────────────────────────────────────────────────────────────

/// Decode `source` into `destination`, logging through `tracing`.
pub fn decode(
    source:      impl AsRef<Path>,
    destination: impl AsRef<Path>,
) -> Result<DecodeSummary, DecodeError> {
    decode_with(source, destination, &DecodeOptions::default(), &mut TracingObserver)
}

/// Decode `source` into `destination`, reporting to `observer`.
///
/// On failure the observer receives `on_failure` and the destination is left
/// as it was.
pub fn decode_with(
    source:      impl AsRef<Path>,
    destination: impl AsRef<Path>,
    options:     &DecodeOptions,
    observer:    &mut dyn DecodeObserver,
) -> Result<DecodeSummary, DecodeError> {
    let result = decode_file(source.as_ref(), destination.as_ref(), options, observer);
    if let Err(e) = &result {
        observer.on_failure(e);
    }
    result
}

fn decode_file(
    source:      &Path,
    destination: &Path,
    options:     &DecodeOptions,
    observer:    &mut dyn DecodeObserver,
) -> Result<DecodeSummary, DecodeError> {
    if !options.overwrite && destination.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", destination.display()),
        )
        .into());
    }

    // The source is closed before the destination is written.
    let (data, summary) = {
        let file = BufReader::new(File::open(source)?);
        let mut reader = AtlasReader::with_observer(file, observer)?;
        let data = reader.decode_all(observer)?;
        let summary = reader.summary(data.len());
        (data, summary)
    };

    persist(destination, &data, options.overwrite)?;
    observer.on_complete(destination, &summary);
    Ok(summary)
}

/// Decode an archive from any reader into memory.
pub fn decode_reader<R: Read>(reader: R, observer: &mut dyn DecodeObserver) -> Result<Vec<u8>, DecodeError> {
    let result = match AtlasReader::with_observer(reader, observer) {
        Ok(mut r) => r.decode_all(observer),
        Err(e)    => Err(e),
    };
    if let Err(e) = &result {
        observer.on_failure(e);
    }
    result
}

/// Read the header and index of `source` without touching chunk data.
pub fn inspect(source: impl AsRef<Path>) -> Result<ArchiveInfo, DecodeError> {
    let file = BufReader::new(File::open(source.as_ref())?);
    Ok(AtlasReader::new(file)?.info())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::SIGNATURE;
    use crate::observer::RecordingObserver;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Cursor;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    /// Build an archive whose index matches its chunks.
    fn archive(chunks: &[&[u8]]) -> Vec<u8> {
        let payloads: Vec<Vec<u8>> = chunks.iter().map(|c| zlib(c)).collect();
        let unpacked: i64 = chunks.iter().map(|c| c.len() as i64).sum();
        let packed: i64 = payloads.iter().map(|p| p.len() as i64).sum();

        let mut out = Vec::new();
        for v in [SIGNATURE, 1024, packed, unpacked] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for (c, p) in chunks.iter().zip(&payloads) {
            out.extend_from_slice(&(p.len() as i64).to_le_bytes());
            out.extend_from_slice(&(c.len() as i64).to_le_bytes());
        }
        for p in &payloads {
            out.extend_from_slice(p);
        }
        out
    }

    #[test]
    fn decodes_chunks_in_index_order() {
        let a = vec![b'a'; 300];
        let b = b"second chunk".to_vec();
        let c = vec![0u8; 1];
        let bytes = archive(&[&a, &b, &c]);

        let out = decode_reader(Cursor::new(bytes), &mut NoopObserver).unwrap();
        assert_eq!(out, [a, b, c].concat());
    }

    #[test]
    fn reader_exposes_header_and_summary() {
        let bytes = archive(&[&b"hello"[..], &b"world!"[..]]);
        let mut r = AtlasReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(r.header.unpacked_size, 11);
        assert_eq!(r.index.len(), 2);

        let out = r.decode_all(&mut NoopObserver).unwrap();
        let s = r.summary(out.len());
        assert_eq!(s.chunk_count, 2);
        assert_eq!(s.bytes_written, 11);
        assert_eq!(s.compressed_read as i64, r.header.packed_size);
        assert_eq!(r.info().total_compressed, r.header.packed_size);
    }

    #[test]
    fn observer_sees_pipeline_in_order() {
        let bytes = archive(&[&b"abc"[..], &b"de"[..]]);
        let mut obs = RecordingObserver::default();
        decode_reader(Cursor::new(bytes), &mut obs).unwrap();
        assert_eq!(obs.events, vec![
            "header 5", "entry 0", "entry 1", "index 2", "chunk 0 3", "chunk 1 2",
        ]);
    }

    #[test]
    fn failure_is_reported_to_observer() {
        let mut bytes = archive(&[&b"abc"[..]]);
        bytes[..8].copy_from_slice(&1i64.to_le_bytes());
        let mut obs = RecordingObserver::default();
        assert!(decode_reader(Cursor::new(bytes), &mut obs).is_err());
        assert_eq!(obs.events, vec!["failure Invalid signature: 1"]);
    }

    #[test]
    fn negative_compressed_size_is_rejected() {
        let mut bytes = archive(&[&b"abc"[..]]);
        // First index entry starts right after the 32-byte header.
        bytes[32..40].copy_from_slice(&(-4i64).to_le_bytes());
        match decode_reader(Cursor::new(bytes), &mut NoopObserver) {
            Err(DecodeError::InvalidChunkLength { index: 0, length: -4 }) => {}
            other => panic!("expected InvalidChunkLength, got {other:?}"),
        }
    }

    #[test]
    fn huge_compressed_size_on_short_file_is_io_error() {
        let mut bytes = archive(&[&b"abc"[..]]);
        bytes[32..40].copy_from_slice(&(i64::MAX).to_le_bytes());
        match decode_reader(Cursor::new(bytes), &mut NoopObserver) {
            Err(DecodeError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[test]
    fn first_failing_chunk_wins() {
        // Chunk 1 is corrupt, chunk 2 is short on bytes: chunk 1 must be reported.
        let bytes = archive(&[&b"good"[..], &b"bad!"[..], &b"tail"[..]]);
        let header_and_index = 32 + 3 * 16;
        let first_len = zlib(b"good").len();
        let mut bytes = bytes;
        bytes[header_and_index + first_len] ^= 0xFF;
        bytes.truncate(bytes.len() - 2);

        let err = decode_reader(Cursor::new(bytes), &mut NoopObserver).unwrap_err();
        assert!(matches!(err, DecodeError::CorruptData { index: 1, .. }), "got {err:?}");
        assert_eq!(err.chunk_index(), Some(1));
    }

    #[test]
    fn overlong_chunk_is_cut_off_at_one_past_declared() {
        let mut bytes = archive(&[&b"ok"[..], &vec![b'x'; 5000][..]]);
        // Second entry's uncompressed_size: header + entry 0 + compressed_size of entry 1.
        let at = 32 + 16 + 8;
        bytes[at..at + 8].copy_from_slice(&4000i64.to_le_bytes());
        // Keep the header total consistent with the index.
        bytes[24..32].copy_from_slice(&4002i64.to_le_bytes());
        match decode_reader(Cursor::new(bytes), &mut NoopObserver) {
            Err(DecodeError::ChunkSizeMismatch { index: 1, expected: 4000, actual: 4001 }) => {}
            other => panic!("expected ChunkSizeMismatch, got {other:?}"),
        }
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_decode_preserves_index_order() {
        let chunks: Vec<Vec<u8>> = (0..64u8)
            .map(|i| (0..(500 + i as usize * 97)).map(|j| (j as u8) ^ i).collect())
            .collect();
        let refs: Vec<&[u8]> = chunks.iter().map(Vec::as_slice).collect();
        let out = decode_reader(Cursor::new(archive(&refs)), &mut NoopObserver).unwrap();
        assert_eq!(out, chunks.concat());
    }

    #[test]
    fn empty_archive_decodes_to_nothing() {
        let bytes = archive(&[]);
        assert_eq!(bytes.len(), 32);
        assert!(decode_reader(Cursor::new(bytes), &mut NoopObserver).unwrap().is_empty());
    }
}
