/// Geolocation of a single address.
///
/// Always the same five slots regardless of which database produced it. A
/// database that does not expose a property (IPinfo Lite has no coordinates
/// or accuracy radius) leaves that slot `None` rather than dropping it, and
/// an address that was not found at all is [`LocationInfo::NOT_FOUND`], with
/// every slot `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationInfo {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// ISO 3166-1 alpha-2 code.
    pub country_code: Option<String>,
    pub accuracy_radius_km: Option<u16>,
    /// Two-letter continent code (`EU`, `NA`, ...).
    pub continent_code: Option<String>,
}

impl LocationInfo {
    /// The all-null location of an address absent from the database.
    pub const NOT_FOUND: LocationInfo = LocationInfo {
        latitude: None,
        longitude: None,
        country_code: None,
        accuracy_radius_km: None,
        continent_code: None,
    };

    pub fn is_not_found(&self) -> bool {
        *self == Self::NOT_FOUND
    }

    /// Both coordinates, if present and within WGS84 bounds.
    pub fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::new(self.latitude?, self.longitude?)
    }
}

/// A validated latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self { latitude, longitude })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Exact bit pattern, usable as a hash key.
    pub(crate) fn bits(&self) -> [u64; 2] {
        [self.latitude.to_bits(), self.longitude.to_bits()]
    }
}

/// Everything one database query yields for an address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoRecord {
    pub location: LocationInfo,
    /// Name of the autonomous system that owns the address.
    pub as_name: Option<String>,
}
