//! Geolocation Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};
use std::net::IpAddr;
use std::path::PathBuf;

/// A geolocation error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for geolocation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The database file could not be read or is not a valid MaxMind DB.
    /// Nothing can be enriched without it; stop before touching any output.
    #[display("unable to open database: {}", _0.display())]
    DatabaseOpen(#[error(not(source))] PathBuf),
    /// A lookup failed for a reason other than the address being absent
    /// (corrupt search tree, undecodable record, address family mismatch).
    #[display("lookup failed for {_0}")]
    Lookup(#[error(not(source))] IpAddr),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(
            ErrorKind::DatabaseOpen(PathBuf::from("GeoLite2-City.mmdb")).to_string(),
            "unable to open database: GeoLite2-City.mmdb"
        );
        assert_eq!(ErrorKind::Lookup("8.8.8.8".parse().unwrap()).to_string(), "lookup failed for 8.8.8.8");
    }
}
