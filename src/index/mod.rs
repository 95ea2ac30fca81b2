//! Chunk index: the (compressed, uncompressed) size pairs that follow the
//! header.
//!
//! The index carries no entry count. Entries are read until their
//! uncompressed sizes account for the header's `unpacked_size`; the loop
//! stops as soon as the running total reaches or passes the target, and
//! only then is the total compared for equality. An entry that overshoots
//! is therefore consumed before the archive is rejected.

use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;
use std::io::Read;

use crate::error::DecodeError;

/// Two little-endian i64 fields.
pub const ENTRY_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkIndexEntry {
    pub compressed_size:   i64,
    pub uncompressed_size: i64,
}

impl ChunkIndexEntry {
    pub fn read<R: Read>(mut reader: R) -> std::io::Result<Self> {
        Ok(Self {
            compressed_size:   reader.read_i64::<LittleEndian>()?,
            uncompressed_size: reader.read_i64::<LittleEndian>()?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkIndex {
    pub entries:      Vec<ChunkIndexEntry>,
    /// Running sum of `uncompressed_size` over `entries`.
    pub size_indexed: i64,
}

impl ChunkIndex {
    /// Read entries until `unpacked_size` is accounted for, then cross-check.
    ///
    /// `on_entry` sees every entry as it is read, before the cross-check.
    pub fn read<R, F>(mut reader: R, unpacked_size: i64, mut on_entry: F) -> Result<Self, DecodeError>
    where
        R: Read,
        F: FnMut(usize, &ChunkIndexEntry),
    {
        let mut index = ChunkIndex::default();
        // An i64 overflow can never match the declared size; saturate for the
        // error report and stop reading.
        let mut overflowed = false;

        while index.size_indexed < unpacked_size {
            let entry = ChunkIndexEntry::read(&mut reader)?;
            on_entry(index.entries.len(), &entry);
            match index.size_indexed.checked_add(entry.uncompressed_size) {
                Some(total) => index.size_indexed = total,
                None => {
                    overflowed = true;
                    index.size_indexed = if entry.uncompressed_size > 0 { i64::MAX } else { i64::MIN };
                }
            }
            index.entries.push(entry);
            if overflowed {
                break;
            }
        }

        if overflowed || index.size_indexed != unpacked_size {
            return Err(DecodeError::HeaderIndexMismatch {
                declared: unpacked_size,
                indexed:  index.size_indexed,
            });
        }
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of declared compressed sizes, saturating. Informational only.
    pub fn total_compressed(&self) -> i64 {
        self.entries.iter().fold(0i64, |acc, e| acc.saturating_add(e.compressed_size))
    }
}
