use crate::record::{EnrichedRecord, RawRecord};
use crate::schema::Generation;
use ecs_geo::{DistanceCalculator, GeoDatabase, LocationInfo, Resolver};
use serde::Deserialize;
use std::net::IpAddr;
use std::ops::Sub;

/// Knobs of the record transformation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct TransformOptions {
    /// Output column set; generation 2 adds the name server's AS name.
    #[serde(default)]
    pub generation: Generation,
    /// Fill `average-distance`. Off by default: geodesic math dominates the
    /// run time on full-size logs.
    #[serde(default)]
    pub compute_distance: bool,
}

/// Row-level degradations, counted instead of failing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransformStats {
    pub rows: u64,
    /// Queried subnets without a `/` or with an unreadable prefix length.
    pub malformed_subnets: u64,
    /// Entries of `returned-ips` that were not IP addresses.
    pub skipped_ips: u64,
}

impl Sub for TransformStats {
    type Output = TransformStats;

    fn sub(self, earlier: Self) -> Self::Output {
        TransformStats {
            rows: self.rows - earlier.rows,
            malformed_subnets: self.malformed_subnets - earlier.malformed_subnets,
            skipped_ips: self.skipped_ips - earlier.skipped_ips,
        }
    }
}

/// Turns raw rows into enriched rows.
///
/// Owns the lookup caches, so one transformer should serve every file of a
/// run: an address resolved for the first log is free for the second.
pub struct Transformer<D> {
    resolver: Resolver<D>,
    distances: DistanceCalculator,
    options: TransformOptions,
    stats: TransformStats,
}

impl<D: GeoDatabase> Transformer<D> {
    pub fn new(database: D, options: TransformOptions) -> Self {
        Self {
            resolver: Resolver::new(database),
            distances: DistanceCalculator::new(),
            options,
            stats: TransformStats::default(),
        }
    }

    pub fn options(&self) -> TransformOptions {
        self.options
    }

    pub fn generation(&self) -> Generation {
        self.options.generation
    }

    /// Totals since construction.
    pub fn stats(&self) -> TransformStats {
        self.stats
    }

    pub fn resolver(&self) -> &Resolver<D> {
        &self.resolver
    }

    pub fn distances(&self) -> &DistanceCalculator {
        &self.distances
    }

    /// Enrich one row. Never fails: whatever can't be derived is left `None`.
    pub fn transform(&mut self, raw: RawRecord) -> EnrichedRecord {
        self.stats.rows += 1;

        let (subnet_address, subnet_prefix_length, subnet_location) = match raw.queried_subnet.split_once('/') {
            Some((address, prefix)) => {
                let prefix_length = prefix.parse::<u8>().ok();
                if prefix_length.is_none() {
                    self.stats.malformed_subnets += 1;
                    tracing::warn!(subnet = raw.queried_subnet, "unreadable subnet prefix length");
                }
                (address.to_string(), prefix_length, Some(self.resolver.resolve(address)))
            },
            None => {
                self.stats.malformed_subnets += 1;
                tracing::warn!(subnet = raw.queried_subnet, domain = raw.domain, "subnet has no prefix length");
                (raw.queried_subnet.clone(), None, None)
            },
        };

        let ns_as = match self.options.generation {
            Generation::V1 => None,
            Generation::V2 => self.resolver.resolve_as(&raw.nameserver_ip),
        };

        let returned_ip_locations = raw.returned_ips.as_deref().map(|ips| self.resolve_list(ips));

        let average_distance_km = match (&subnet_location, &returned_ip_locations) {
            (Some(origin), Some(destinations)) if self.options.compute_distance => {
                self.distances.average_distance(origin, destinations)
            },
            _ => None,
        };

        EnrichedRecord {
            timestamp: raw.timestamp,
            domain: raw.domain,
            nameserver_ip: raw.nameserver_ip,
            ns_as,
            subnet_address,
            subnet_prefix_length,
            subnet_location,
            returned_subnet: raw.returned_subnet,
            returned_scope: raw.returned_scope,
            returned_ips: raw.returned_ips,
            returned_ip_locations,
            average_distance_km,
        }
    }

    fn resolve_list(&mut self, ips: &str) -> Vec<LocationInfo> {
        let mut locations = Vec::new();
        for ip in ips.split(',').map(str::trim) {
            if ip.parse::<IpAddr>().is_err() {
                self.stats.skipped_ips += 1;
                tracing::warn!(ip, "skipping unparseable answer address");
                continue;
            }
            locations.push(self.resolver.resolve(ip));
        }
        locations
    }
}
