//! Finishable compression writers.

use crate::error::{ErrorKind, Result};
use bzip2::write::BzEncoder;
use exn::ResultExt;
use flate2::write::GzEncoder;
use std::io::{self, Write};

/// A writer that compresses into `W` and must be explicitly [`finish`](Self::finish)ed.
///
/// Unlike a boxed `dyn Write`, dropping is never relied upon to write the
/// trailer: finishing surfaces any I/O error and hands back the inner writer,
/// so a caller can compress a batch into a `Vec<u8>` and append it whole.
pub enum Encoder<W: Write> {
    None(W),
    Bzip2(BzEncoder<W>),
    Gzip(GzEncoder<W>),
}

impl<W: Write> Encoder<W> {
    /// Write the compression trailer and return the inner writer.
    pub fn finish(self) -> Result<W> {
        let mut inner = match self {
            Encoder::None(w) => w,
            Encoder::Bzip2(e) => e.finish().or_raise(|| ErrorKind::Io)?,
            Encoder::Gzip(e) => e.finish().or_raise(|| ErrorKind::Io)?,
        };
        inner.flush().or_raise(|| ErrorKind::Io)?;
        Ok(inner)
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Encoder::None(w) => w.write(buf),
            Encoder::Bzip2(e) => e.write(buf),
            Encoder::Gzip(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Encoder::None(w) => w.flush(),
            Encoder::Bzip2(e) => e.flush(),
            Encoder::Gzip(e) => e.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Compression;
    use rstest::rstest;
    use std::io::Write;

    #[rstest]
    #[case(Compression::None)]
    #[case(Compression::Bzip2)]
    #[case(Compression::Gzip)]
    fn test_encoder_finish(#[case] format: Compression) {
        let mut encoder = format.encoder(Vec::new());
        encoder.write_all(b"a;b;c\n").unwrap();
        let compressed = encoder.finish().unwrap();
        assert_eq!(Compression::from_magic_bytes(&compressed), format);
        assert_eq!(format.decompress(&compressed).unwrap(), b"a;b;c\n");
    }
}
