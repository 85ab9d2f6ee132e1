//! IP geolocation and network-ownership lookups with process-lifetime
//! memoization.
//!
//! # Architecture
//! - [`GeoDatabase`] abstracts a read-only, binary IP database. Adapters for
//!   the MaxMind DB file format cover GeoLite2-City, GeoLite2-ASN and IPinfo
//!   Lite, and [`LayeredDatabase`] combines a location source with a sibling
//!   network-ownership source.
//! - [`Resolver`] owns one database handle and one cache keyed by the IP
//!   string, answering both location and AS-name questions from a single
//!   query per distinct address. Misses are cached too: the database is
//!   immutable for the lifetime of a run.
//! - [`DistanceCalculator`] computes ellipsoidal (WGS84) geodesic distances
//!   and memoizes them per coordinate pair.
//!
//! Nothing in here is global: a run constructs its resolver and calculator
//! once and drops them (closing the database) when it is done.

pub mod database;
mod distance;
pub mod error;
mod location;
mod resolver;

pub use crate::database::{DatabaseKind, GeoDatabase, LayeredDatabase};
pub use crate::distance::DistanceCalculator;
pub use crate::location::{Coordinates, GeoRecord, LocationInfo};
pub use crate::resolver::{CacheStats, Resolver};
