//! Runner Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A runner error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for the runner.
pub type Result<T> = std::result::Result<T, Error>;

/// Which stage of the run failed. The cause is the child frame.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    #[display("unable to open the geolocation database")]
    Database,
    #[display("enrichment of {} failed", _0.display())]
    Enrich(#[error(not(source))] PathBuf),
    #[display("post-filter of {} failed", _0.display())]
    Filter(#[error(not(source))] PathBuf),
}
