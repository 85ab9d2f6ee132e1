//! In-memory database for testing.

use crate::database::GeoDatabase;
use crate::error::{ErrorKind, Result};
use crate::{GeoRecord, LocationInfo};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory [`GeoDatabase`] for testing.
///
/// Records live in a `HashMap` keyed by address; every call to
/// [`lookup`](GeoDatabase::lookup) is counted, so tests can observe whether
/// a cache answered instead of the database.
///
/// # Examples
///
/// ```
/// use ecs_geo::database::MockDatabase;
/// use ecs_geo::{GeoDatabase, LocationInfo};
///
/// let database = MockDatabase::new().with_location("9.9.9.9", LocationInfo {
///     country_code: Some("US".to_string()),
///     ..LocationInfo::NOT_FOUND
/// });
/// assert!(database.lookup("9.9.9.9".parse().unwrap()).unwrap().is_some());
/// assert!(database.lookup("8.8.4.4".parse().unwrap()).unwrap().is_none());
/// assert_eq!(database.queries(), 2);
/// ```
#[derive(Default)]
pub struct MockDatabase {
    records: HashMap<IpAddr, GeoRecord>,
    failing: HashSet<IpAddr>,
    queries: AtomicUsize,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace the location of) a record.
    ///
    /// Panics on an unparseable address. If test setup is wrong, then test
    /// should not pass.
    pub fn with_location(mut self, address: &str, location: LocationInfo) -> Self {
        self.records.entry(Self::parse(address)).or_default().location = location;
        self
    }

    /// Add (or replace the AS name of) a record.
    pub fn with_as_name(mut self, address: &str, as_name: &str) -> Self {
        self.records.entry(Self::parse(address)).or_default().as_name = Some(as_name.to_string());
        self
    }

    /// Make every lookup of `address` fail as if the database were corrupt.
    pub fn with_failure(mut self, address: &str) -> Self {
        self.failing.insert(Self::parse(address));
        self
    }

    /// Number of lookups performed so far.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }

    fn parse(address: &str) -> IpAddr {
        let Ok(parsed) = address.parse() else {
            // The panic here is DELIBERATE. MockDatabase is intended to be
            // used in tests; panics are expected.
            panic!("MockDatabase: invalid address {address}");
        };
        parsed
    }
}

impl GeoDatabase for MockDatabase {
    fn describe(&self) -> String {
        format!("mock ({} records)", self.records.len())
    }

    fn lookup(&self, address: IpAddr) -> Result<Option<GeoRecord>> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        if self.failing.contains(&address) {
            exn::bail!(ErrorKind::Lookup(address));
        }
        Ok(self.records.get(&address).cloned())
    }
}
