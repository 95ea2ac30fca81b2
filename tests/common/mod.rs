#![allow(dead_code)]

use atlaskit::SIGNATURE;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// Raw archive builder: every field is set explicitly so tests can lie in
/// the header or index.
#[derive(Default)]
pub struct ArchiveBuilder {
    pub signature:       Option<i64>,
    pub chunk_unit_size: i64,
    pub packed_size:     Option<i64>,
    pub unpacked_size:   Option<i64>,
    pub entries:         Vec<(i64, i64)>,
    pub payloads:        Vec<Vec<u8>>,
}

impl ArchiveBuilder {
    /// Consistent archive: index and header match the chunks.
    pub fn from_chunks(chunks: &[Vec<u8>]) -> Self {
        let mut b = ArchiveBuilder { chunk_unit_size: 1024, ..Default::default() };
        for c in chunks {
            let p = zlib(c);
            b.entries.push((p.len() as i64, c.len() as i64));
            b.payloads.push(p);
        }
        b
    }

    pub fn build(&self) -> Vec<u8> {
        let unpacked = self.unpacked_size
            .unwrap_or_else(|| self.entries.iter().map(|e| e.1).sum());
        let packed = self.packed_size
            .unwrap_or_else(|| self.payloads.iter().map(|p| p.len() as i64).sum());

        let mut out = Vec::new();
        for v in [self.signature.unwrap_or(SIGNATURE), self.chunk_unit_size, packed, unpacked] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for (c, u) in &self.entries {
            out.extend_from_slice(&c.to_le_bytes());
            out.extend_from_slice(&u.to_le_bytes());
        }
        for p in &self.payloads {
            out.extend_from_slice(p);
        }
        out
    }
}

/// Deterministic, mildly compressible test content.
pub fn sample(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed) % 97).collect()
}
