use crate::{GeoDatabase, GeoRecord, LocationInfo};
use rustc_hash::FxHashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::net::IpAddr;

/// Hit/miss counters for a memoization table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of lookups answered from cache, `0.0` when nothing was looked up.
    pub fn hit_ratio(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            n => self.hits as f64 / n as f64,
        }
    }
}

impl Display for CacheStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} hits / {} misses ({:.1}%)", self.hits, self.misses, self.hit_ratio() * 100.0)
    }
}

/// Memoizing front for a [`GeoDatabase`].
///
/// Location and AS name come from the same query and share a single cache
/// keyed by the address string exactly as it appeared in the log, so the
/// second occurrence of an address costs neither a parse nor a query.
///
/// Every outcome is cached, including:
/// - addresses absent from the database ([`LocationInfo::NOT_FOUND`]),
/// - strings that are not IP addresses at all,
/// - lookups that failed inside the database (logged once, then null).
///
/// The cache never evicts. It lives exactly as long as the resolver, which
/// owns the database handle.
pub struct Resolver<D> {
    database: D,
    cache: FxHashMap<Box<str>, GeoRecord>,
    stats: CacheStats,
}

impl<D: GeoDatabase> Resolver<D> {
    pub fn new(database: D) -> Self {
        tracing::debug!(database = %database.describe(), "created resolver");
        Self {
            database,
            cache: FxHashMap::default(),
            stats: CacheStats::default(),
        }
    }

    /// Location and AS name for `ip`, querying the database at most once per
    /// distinct string.
    pub fn resolve_all(&mut self, ip: &str) -> &GeoRecord {
        // `get` followed by `insert` can't return the borrow from the first
        // branch, hence the double lookup on a hit.
        if self.cache.contains_key(ip) {
            self.stats.hits += 1;
            return &self.cache[ip];
        }
        self.stats.misses += 1;
        let record = self.query(ip);
        self.cache.entry(ip.into()).or_insert(record)
    }

    /// Location of `ip`; all-null when unknown or malformed.
    pub fn resolve(&mut self, ip: &str) -> LocationInfo {
        self.resolve_all(ip).location.clone()
    }

    /// Owning network's name for `ip`, if known.
    pub fn resolve_as(&mut self, ip: &str) -> Option<String> {
        self.resolve_all(ip).as_name.clone()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Number of distinct addresses cached.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn database(&self) -> &D {
        &self.database
    }

    fn query(&self, ip: &str) -> GeoRecord {
        let Ok(address) = ip.parse::<IpAddr>() else {
            tracing::debug!(ip, "not an IP address; resolving to null");
            return GeoRecord::default();
        };
        match self.database.lookup(address) {
            Ok(Some(record)) => record,
            Ok(None) => GeoRecord::default(),
            Err(err) => {
                tracing::warn!(ip, error = %err, "database lookup failed; resolving to null");
                GeoRecord::default()
            },
        }
    }
}
