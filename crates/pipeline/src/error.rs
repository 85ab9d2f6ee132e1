//! Pipeline Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Only file-level problems are errors: a row that can't
//! be fully enriched still produces an output row with null fields.

use derive_more::{Display, Error};
use ecs_compress::error::{Error as CompressionError, ErrorKind as CompressionErrorKind};
use std::path::PathBuf;

/// A pipeline error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input log could not be opened or read to the end.
    #[display("unable to read input: {}", _0.display())]
    Input(#[error(not(source))] PathBuf),
    /// The output log could not be created, written or moved into place.
    #[display("unable to write output: {}", _0.display())]
    Output(#[error(not(source))] PathBuf),
    /// Compressed data was corrupt, or a batch could not be compressed.
    #[display("compression error: {_0}")]
    Compression(CompressionErrorKind),
    /// A line could not be split into fields.
    #[display("malformed delimited text")]
    Csv,
    /// A location literal in an enriched log could not be parsed.
    #[display("malformed location literal: {_0}")]
    Literal(#[error(not(source))] String),
    /// A row does not fit the column set of the configured generation.
    #[display("schema mismatch: {_0}")]
    Schema(#[error(not(source))] String),
}

impl ErrorKind {
    /// Convert a compression error into a pipeline error, keeping the
    /// compress crate's frame as a child in the error tree.
    #[track_caller]
    pub fn compression(err: CompressionError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Compression(inner))
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Output(_) => true,
            Self::Compression(kind) => kind.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::Input(PathBuf::from("scan.csv.gz")).to_string(), "unable to read input: scan.csv.gz");
        assert_eq!(ErrorKind::Literal("(1.0,".to_string()).to_string(), "malformed location literal: (1.0,");
        assert_eq!(
            ErrorKind::Compression(CompressionErrorKind::InvalidData).to_string(),
            "compression error: invalid or corrupted data"
        );
    }

    #[test]
    fn compression_error_is_wrapped() {
        let err = ecs_compress::Compression::Gzip.decompress(b"not gzip at all").unwrap_err();
        let wrapped = ErrorKind::compression(err);
        assert_eq!(*wrapped, ErrorKind::Compression(CompressionErrorKind::InvalidData));
        assert!(!wrapped.is_retryable());
    }
}
