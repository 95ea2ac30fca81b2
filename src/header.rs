use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;
use std::io::Read;

use crate::error::DecodeError;

/// Signature/version word at offset 0 of every supported archive.
pub const SIGNATURE: i64 = 2653586369;
/// Four little-endian i64 fields.
pub const HEADER_SIZE: usize = 32;

/// Fixed archive header.
///
/// Only `unpacked_size` is authoritative: the index must sum to it exactly.
/// `chunk_unit_size` and `packed_size` are carried for reporting and never
/// checked against the chunks themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArchiveHeader {
    pub signature_version: i64,
    pub chunk_unit_size:   i64,
    pub packed_size:       i64,
    pub unpacked_size:     i64,
}

impl ArchiveHeader {
    /// Read and validate the header.
    ///
    /// The signature is checked as soon as its 8 bytes are in: a foreign
    /// file is rejected with `InvalidSignature` before the rest of the header
    /// is consumed, even when it is shorter than `HEADER_SIZE`.
    pub fn read<R: Read>(mut reader: R) -> Result<Self, DecodeError> {
        let signature_version = reader.read_i64::<LittleEndian>()?;
        if signature_version != SIGNATURE {
            return Err(DecodeError::InvalidSignature { found: signature_version });
        }
        Ok(Self {
            signature_version,
            chunk_unit_size: reader.read_i64::<LittleEndian>()?,
            packed_size:     reader.read_i64::<LittleEndian>()?,
            unpacked_size:   reader.read_i64::<LittleEndian>()?,
        })
    }
}
