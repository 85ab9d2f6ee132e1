//! Database trait and MaxMind DB adapters.
//!
//! Each adapter wraps a [`maxminddb::Reader`] that is opened once, read-only,
//! and queried by parsed address. "Address not in the database" is an
//! expected outcome (`Ok(None)`), never an error.

mod asn;
mod city;
mod ipinfo;
mod layered;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::asn::AsnDatabase;
pub use self::city::CityDatabase;
pub use self::ipinfo::IpinfoLiteDatabase;
pub use self::layered::LayeredDatabase;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockDatabase;
use crate::GeoRecord;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use maxminddb::{MaxMindDBError, Reader};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::Path;

/// A read-only IP → metadata database.
///
/// Implementations must be referentially transparent for the duration of a
/// run: the same address always yields the same answer. [`Resolver`] relies
/// on this to cache both hits and misses.
///
/// [`Resolver`]: crate::Resolver
pub trait GeoDatabase: Send + Sync {
    /// Short description for logging (database type and build).
    fn describe(&self) -> String;

    /// Look up one address. `Ok(None)` means the address is not covered.
    fn lookup(&self, address: IpAddr) -> Result<Option<GeoRecord>>;
}

impl<D: GeoDatabase + ?Sized> GeoDatabase for Box<D> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn lookup(&self, address: IpAddr) -> Result<Option<GeoRecord>> {
        (**self).lookup(address)
    }
}

/// Which database product backs location lookups.
///
/// This decides which [`LocationInfo`](crate::LocationInfo) slots can ever be
/// populated: GeoLite2-City fills all five, IPinfo Lite only country and
/// continent (plus the AS name).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatabaseKind {
    #[serde(rename = "geolite2-city")]
    GeoLite2City,
    IpinfoLite,
}

impl DatabaseKind {
    /// Open the database at `path`, optionally layering a GeoLite2-ASN file on
    /// top for AS names.
    ///
    /// # Errors
    /// [`ErrorKind::DatabaseOpen`] if either file is missing or unreadable.
    pub fn open(&self, path: &Path, asn_path: Option<&Path>) -> Result<Box<dyn GeoDatabase>> {
        let primary: Box<dyn GeoDatabase> = match self {
            DatabaseKind::GeoLite2City => Box::new(CityDatabase::open(path)?),
            DatabaseKind::IpinfoLite => Box::new(IpinfoLiteDatabase::open(path)?),
        };
        Ok(match asn_path {
            Some(asn_path) => Box::new(LayeredDatabase::new(primary, AsnDatabase::open(asn_path)?)),
            None => primary,
        })
    }
}

/// Read a MaxMind DB file fully into memory.
pub(crate) fn open_reader(path: &Path) -> Result<Reader<Vec<u8>>> {
    let reader = Reader::open_readfile(path).or_raise(|| ErrorKind::DatabaseOpen(path.to_path_buf()))?;
    tracing::info!(
        path = %path.display(),
        database_type = %reader.metadata.database_type,
        build_epoch = reader.metadata.build_epoch,
        "opened database",
    );
    Ok(reader)
}

pub(crate) fn describe_reader(reader: &Reader<Vec<u8>>) -> String {
    format!("{} (build {})", reader.metadata.database_type, reader.metadata.build_epoch)
}

/// Decode the record for `address`, folding "not found" into `Ok(None)`.
pub(crate) fn lookup_record<'de, T: Deserialize<'de>>(
    reader: &'de Reader<Vec<u8>>,
    address: IpAddr,
) -> Result<Option<T>> {
    match reader.lookup::<T>(address) {
        Ok(record) => Ok(Some(record)),
        Err(MaxMindDBError::AddressNotFoundError(_)) => Ok(None),
        Err(err) => Err(err).or_raise(|| ErrorKind::Lookup(address)),
    }
}
