//! Peekable readers for sniffing the format of a stream before decoding it.
//!
//! Thin convenience wrapper around standard library I/O primitives
//! ([`Read::take`], [`Cursor`], [`Chain`]) for the peek-decide-stream pattern.

use crate::Compression;
use crate::construct::MAGIC_LEN;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::io::{Chain, Cursor, Read};

/// A resumable [`Read`]er for peek-decide-stream workflows.
///
/// Read enough data to inspect (e.g. magic bytes), then stream the full
/// content onward via [`into_reader`](Self::into_reader), which replays what
/// was peeked.
pub struct PeekableReader<R> {
    inner: R,
    buffer: Vec<u8>,
}

impl<R: Read> PeekableReader<R> {
    /// Wrap any reader for peeking.
    pub fn new(inner: R) -> Self {
        Self { inner, buffer: Vec::new() }
    }

    /// Read up to `limit` bytes of the content.
    ///
    /// Returns a slice of all buffered data. Successive calls do not accumulate:
    /// - `peek(4)` puts 4 bytes in the buffer, returns 4 bytes
    /// - `peek(8)` puts an additional 4 bytes in the buffer, returns 8 bytes
    /// - `peek(2)` immediately returns 2 bytes (because buffer already has 8)
    pub fn peek(&mut self, limit: usize) -> Result<&[u8]> {
        if self.buffer.len() >= limit {
            return Ok(&self.buffer[..limit]);
        }
        let needed = (limit - self.buffer.len()) as u64;
        (&mut self.inner).take(needed).read_to_end(&mut self.buffer).or_raise(|| ErrorKind::Io)?;
        Ok(&self.buffer[..self.buffer.len().min(limit)])
    }

    /// Convert into a [`Read`]er that replays the buffered head, then
    /// streams the remaining input.
    pub fn into_reader(self) -> Chain<Cursor<Vec<u8>>, R> {
        Cursor::new(self.buffer).chain(self.inner)
    }
}

impl Compression {
    /// Sniff the compression of a stream from its magic bytes and return a
    /// decoding reader over the whole stream.
    ///
    /// File extensions lie; the leading bytes don't. Input that matches no
    /// known signature (including empty input) is treated as uncompressed.
    ///
    /// # Example
    ///
    /// ```
    /// use ecs_compress::Compression;
    /// use std::io::{Cursor, Read};
    ///
    /// let compressed = Compression::Bzip2.compress(b"a;b;c\n").unwrap();
    /// let (format, mut reader) = Compression::detect(Cursor::new(compressed)).unwrap();
    /// assert_eq!(format, Compression::Bzip2);
    ///
    /// let mut text = String::new();
    /// reader.read_to_string(&mut text).unwrap();
    /// assert_eq!(text, "a;b;c\n");
    /// ```
    pub fn detect<'a, R: Read + 'a>(reader: R) -> Result<(Compression, Box<dyn Read + 'a>)> {
        let mut peekable = PeekableReader::new(reader);
        let format = Compression::from_magic_bytes(peekable.peek(MAGIC_LEN)?);
        tracing::debug!(%format, "detected stream compression");
        Ok((format, format.wrap_reader(peekable.into_reader())))
    }
}
