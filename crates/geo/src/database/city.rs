use crate::database::{GeoDatabase, describe_reader, lookup_record, open_reader};
use crate::error::Result;
use crate::{GeoRecord, LocationInfo};
use maxminddb::{Reader, geoip2};
use std::net::IpAddr;
use std::path::Path;

/// MaxMind GeoLite2-City (or GeoIP2-City) database.
///
/// Resolves all five location slots; carries no network ownership data.
pub struct CityDatabase {
    reader: Reader<Vec<u8>>,
}

impl CityDatabase {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let reader = open_reader(path.as_ref())?;
        if !reader.metadata.database_type.contains("City") {
            tracing::warn!(
                database_type = %reader.metadata.database_type,
                "database does not look like a City database; locations may be empty",
            );
        }
        Ok(Self { reader })
    }
}

impl GeoDatabase for CityDatabase {
    fn describe(&self) -> String {
        describe_reader(&self.reader)
    }

    fn lookup(&self, address: IpAddr) -> Result<Option<GeoRecord>> {
        let Some(city) = lookup_record::<geoip2::City>(&self.reader, address)? else {
            return Ok(None);
        };
        let location = city.location.as_ref();
        Ok(Some(GeoRecord {
            location: LocationInfo {
                latitude: location.and_then(|l| l.latitude),
                longitude: location.and_then(|l| l.longitude),
                country_code: city.country.as_ref().and_then(|c| c.iso_code).map(str::to_string),
                accuracy_radius_km: location.and_then(|l| l.accuracy_radius),
                continent_code: city.continent.as_ref().and_then(|c| c.code).map(str::to_string),
            },
            as_name: None,
        }))
    }
}
