//! Compression and decompression with automatic format detection.
//!
//! Measurement logs arrive either plain or compressed, and the enriched logs
//! are written as a sequence of independently compressed batches. This crate
//! wraps the codecs behind a unified [`Compression`] enum, providing:
//!
//! - **Format detection** from file extensions ([`Compression::from_path`]) or
//!   magic bytes ([`Compression::from_magic_bytes`], [`Compression::detect`])
//! - **In-memory** compression/decompression ([`Compression::compress`],
//!   [`Compression::decompress`])
//! - **Streaming** decoders via [`Compression::wrap_reader`] and finishable
//!   encoders via [`Compression::encoder`]
//!
//! Gzip and Bzip2 decoders accept multi-member streams, so a file built by
//! appending one compressed member per batch reads back as one continuous
//! text stream.

mod construct;
mod encoder;
pub mod error;
mod ops;
mod peekable;
mod util;

pub use crate::encoder::Encoder;
pub use crate::peekable::PeekableReader;

/// A supported compression format.
///
/// Defaults to [`None`](Self::None) (uncompressed).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Uncompressed
    #[default]
    None,
    /// Bzip2 compression (.bz2)
    Bzip2,
    /// Gzip compression (.gz)
    Gzip,
}
