use crate::resolver::CacheStats;
use crate::{Coordinates, LocationInfo};
use geographiclib_rs::{Geodesic, InverseGeodesic};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;

type PairKey = ([u64; 2], [u64; 2]);

/// Geodesic distance on the WGS84 ellipsoid, memoized per coordinate pair.
///
/// Pairs are stored in a canonical order and always computed in that order,
/// so `distance_km(a, b)` and `distance_km(b, a)` return the same bits.
pub struct DistanceCalculator {
    geodesic: Geodesic,
    cache: FxHashMap<PairKey, f64>,
    stats: CacheStats,
}

impl Default for DistanceCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl DistanceCalculator {
    pub fn new() -> Self {
        Self {
            geodesic: Geodesic::wgs84(),
            cache: FxHashMap::default(),
            stats: CacheStats::default(),
        }
    }

    /// Distance between two points in kilometres.
    pub fn distance_km(&mut self, a: Coordinates, b: Coordinates) -> f64 {
        let (first, second) = match compare(&a, &b) {
            Ordering::Greater => (b, a),
            _ => (a, b),
        };
        let key = (first.bits(), second.bits());
        if let Some(&km) = self.cache.get(&key) {
            self.stats.hits += 1;
            return km;
        }
        self.stats.misses += 1;
        let metres: f64 = self.geodesic.inverse(
            first.latitude(),
            first.longitude(),
            second.latitude(),
            second.longitude(),
        );
        let km = metres / 1000.0;
        self.cache.insert(key, km);
        km
    }

    /// Mean distance from `origin` to every destination that has coordinates.
    ///
    /// `None` when the origin has no coordinates or no destination does.
    pub fn average_distance(&mut self, origin: &LocationInfo, destinations: &[LocationInfo]) -> Option<f64> {
        let origin = origin.coordinates()?;
        let (sum, count) = destinations
            .iter()
            .filter_map(LocationInfo::coordinates)
            .fold((0.0, 0usize), |(sum, count), destination| {
                (sum + self.distance_km(origin, destination), count + 1)
            });
        (count > 0).then(|| sum / count as f64)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Number of distinct pairs cached.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

fn compare(a: &Coordinates, b: &Coordinates) -> Ordering {
    a.latitude()
        .total_cmp(&b.latitude())
        .then_with(|| a.longitude().total_cmp(&b.longitude()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn point(latitude: f64, longitude: f64) -> Coordinates {
        Coordinates::new(latitude, longitude).unwrap()
    }

    fn located(latitude: f64, longitude: f64) -> LocationInfo {
        LocationInfo {
            latitude: Some(latitude),
            longitude: Some(longitude),
            ..LocationInfo::NOT_FOUND
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        let relative = ((actual - expected) / expected).abs();
        assert!(relative < 1e-4, "{actual} is not within 0.01% of {expected}");
    }

    #[rstest]
    #[case((50.0, 10.0), (40.0, -75.0), 6425.782216771941)]
    #[case((52.52, 13.405), (48.8566, 2.3522), 879.6993161307519)]
    #[case((0.0, 0.0), (0.0, 1.0), 111.31949079322641)]
    #[case((51.5, -0.12), (40.7, -74.0), 5586.501473077633)]
    fn known_distances(#[case] a: (f64, f64), #[case] b: (f64, f64), #[case] expected: f64) {
        let mut calculator = DistanceCalculator::new();
        assert_close(calculator.distance_km(point(a.0, a.1), point(b.0, b.1)), expected);
    }

    #[test]
    fn symmetric_and_cached() {
        let mut calculator = DistanceCalculator::new();
        let berlin = point(52.52, 13.405);
        let paris = point(48.8566, 2.3522);
        let there = calculator.distance_km(berlin, paris);
        let back = calculator.distance_km(paris, berlin);
        assert_eq!(there.to_bits(), back.to_bits());
        assert_eq!(calculator.len(), 1);
        assert_eq!(calculator.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn same_point_is_zero() {
        let mut calculator = DistanceCalculator::new();
        assert_eq!(calculator.distance_km(point(50.0, 10.0), point(50.0, 10.0)), 0.0);
    }

    #[test]
    fn average_skips_destinations_without_coordinates() {
        let mut calculator = DistanceCalculator::new();
        let destinations = [
            located(40.0, -75.0),
            LocationInfo { country_code: Some("US".to_string()), ..LocationInfo::NOT_FOUND },
            located(40.0, -75.0),
        ];
        let average = calculator.average_distance(&located(50.0, 10.0), &destinations).unwrap();
        assert_close(average, 6425.782216771941);
    }

    #[test]
    fn average_of_two() {
        let mut calculator = DistanceCalculator::new();
        let destinations = [located(0.0, 1.0), located(0.0, -1.0)];
        let average = calculator.average_distance(&located(0.0, 0.0), &destinations).unwrap();
        assert_close(average, 111.31949079322641);
    }

    #[rstest]
    #[case::origin_without_coordinates(LocationInfo::NOT_FOUND, vec![located(40.0, -75.0)])]
    #[case::no_destinations(located(50.0, 10.0), vec![])]
    #[case::no_destination_coordinates(located(50.0, 10.0), vec![LocationInfo::NOT_FOUND])]
    fn average_is_null(#[case] origin: LocationInfo, #[case] destinations: Vec<LocationInfo>) {
        let mut calculator = DistanceCalculator::new();
        assert_eq!(calculator.average_distance(&origin, &destinations), None);
    }
}
