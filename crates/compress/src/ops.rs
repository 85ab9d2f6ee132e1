//! Compression Operations

use crate::error::{ErrorKind, Result};
use crate::{Compression, Encoder};
use bzip2::{Compression as BzCompression, read::MultiBzDecoder, write::BzEncoder};
use exn::ResultExt;
use flate2::{Compression as GzCompression, read::MultiGzDecoder, write::GzEncoder};
use std::io::{Read, Write};
use tracing::instrument;

// Logs run to billions of rows and every batch is compressed on the hot path,
// so use the codecs' default levels rather than their slowest settings.
const BZIP2_LEVEL: BzCompression = BzCompression::new(6);
const GZIP_LEVEL: GzCompression = GzCompression::new(6);

impl Compression {
    /// Compress a byte slice in memory.
    ///
    /// # Examples
    ///
    /// ```
    /// use ecs_compress::Compression;
    ///
    /// let data = b"2024-01-20T01:00:00;example.com;8.8.8.8;1.2.3.0/24;;;";
    /// let compressed = Compression::Gzip.compress(data).unwrap();
    /// assert_eq!(Compression::from_magic_bytes(&compressed), Compression::Gzip);
    /// ```
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = self.encoder(Vec::with_capacity(input.len() / 4));
        encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
        encoder.finish()
    }

    /// Decompress a byte slice in memory.
    ///
    /// Concatenated members are decoded back to back.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ecs_compress::Compression;
    ///
    /// let mut joined = Compression::Gzip.compress(b"first\n").unwrap();
    /// joined.extend(Compression::Gzip.compress(b"second\n").unwrap());
    /// let decompressed = Compression::Gzip.decompress(&joined).unwrap();
    /// assert_eq!(decompressed, b"first\nsecond\n");
    /// ```
    #[instrument(skip(input), fields(format = %self, input_size = input.len(), output_size))]
    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let size = self.wrap_reader(input).read_to_end(&mut output).or_raise(|| ErrorKind::InvalidData)?;
        tracing::Span::current().record("output_size", size);
        Ok(output)
    }

    /// Wrap a reader with the appropriate decompression layer.
    ///
    /// Returns a boxed reader that automatically decompresses data, including
    /// streams made of several concatenated members.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::{Cursor, Read};
    /// use ecs_compress::Compression;
    ///
    /// let original = b"Hello, world!";
    /// let compressed = Compression::Gzip.compress(original).unwrap();
    /// let mut reader = Compression::Gzip.wrap_reader(Cursor::new(compressed));
    /// let mut decompressed = Vec::new();
    /// reader.read_to_end(&mut decompressed).unwrap();
    /// assert_eq!(decompressed, original);
    /// ```
    pub fn wrap_reader<'a, R: Read + 'a>(&self, reader: R) -> Box<dyn Read + 'a> {
        match self {
            Compression::None => Box::new(reader),
            Compression::Bzip2 => Box::new(MultiBzDecoder::new(reader)),
            Compression::Gzip => Box::new(MultiGzDecoder::new(reader)),
        }
    }

    /// Wrap a writer with the appropriate compression layer.
    ///
    /// The returned [`Encoder`] must be finished to produce a complete
    /// compressed member.
    pub fn encoder<W: Write>(&self, writer: W) -> Encoder<W> {
        match self {
            Compression::None => Encoder::None(writer),
            Compression::Bzip2 => Encoder::Bzip2(BzEncoder::new(writer, BZIP2_LEVEL)),
            Compression::Gzip => Encoder::Gzip(GzEncoder::new(writer, GZIP_LEVEL)),
        }
    }
}
