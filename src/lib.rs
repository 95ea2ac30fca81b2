//! Decoder for Atlas Steam Workshop `.z` archives.
//!
//! ```no_run
//! let summary = atlaskit::decode("mod.z", "mod.bin")?;
//! println!("{} chunks, {} bytes", summary.chunk_count, summary.bytes_written);
//! # Ok::<(), atlaskit::DecodeError>(())
//! ```

pub mod header;
pub mod index;
pub mod codec;
pub mod error;
pub mod observer;
pub mod decoder;

pub use header::{ArchiveHeader, SIGNATURE};
pub use index::{ChunkIndex, ChunkIndexEntry};
pub use codec::{ChunkCodec, CodecError, ZlibCodec};
pub use error::DecodeError;
pub use observer::{DecodeObserver, NoopObserver, TracingObserver};
pub use decoder::{
    decode, decode_reader, decode_with, inspect, ArchiveInfo, AtlasReader, DecodeOptions,
    DecodeSummary,
};
