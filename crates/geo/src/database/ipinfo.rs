use crate::database::{GeoDatabase, describe_reader, lookup_record, open_reader};
use crate::error::Result;
use crate::{GeoRecord, LocationInfo};
use maxminddb::Reader;
use serde::Deserialize;
use std::net::IpAddr;
use std::path::Path;

/// Record layout of the IPinfo Lite MMDB export. Unlisted keys (`asn`,
/// `as_domain`, `country`, `continent`) are ignored.
#[derive(Deserialize)]
struct LiteRecord<'a> {
    #[serde(borrow)]
    country_code: Option<&'a str>,
    #[serde(borrow)]
    continent_code: Option<&'a str>,
    #[serde(borrow)]
    as_name: Option<&'a str>,
}

/// IPinfo Lite database: country, continent and AS name in one lookup.
///
/// Has no coordinates or accuracy radius, so those slots stay `None` and
/// distances cannot be computed from its locations.
pub struct IpinfoLiteDatabase {
    reader: Reader<Vec<u8>>,
}

impl IpinfoLiteDatabase {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self { reader: open_reader(path.as_ref())? })
    }
}

impl GeoDatabase for IpinfoLiteDatabase {
    fn describe(&self) -> String {
        describe_reader(&self.reader)
    }

    fn lookup(&self, address: IpAddr) -> Result<Option<GeoRecord>> {
        let Some(record) = lookup_record::<LiteRecord>(&self.reader, address)? else {
            return Ok(None);
        };
        Ok(Some(GeoRecord {
            location: LocationInfo {
                country_code: record.country_code.map(str::to_string),
                continent_code: record.continent_code.map(str::to_string),
                ..LocationInfo::NOT_FOUND
            },
            as_name: record.as_name.map(str::to_string),
        }))
    }
}
