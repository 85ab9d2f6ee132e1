use crate::database::{GeoDatabase, describe_reader, lookup_record, open_reader};
use crate::error::Result;
use crate::{GeoRecord, LocationInfo};
use maxminddb::{Reader, geoip2};
use std::net::IpAddr;
use std::path::Path;

/// MaxMind GeoLite2-ASN database. Only ever fills [`GeoRecord::as_name`].
pub struct AsnDatabase {
    reader: Reader<Vec<u8>>,
}

impl AsnDatabase {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self { reader: open_reader(path.as_ref())? })
    }
}

impl GeoDatabase for AsnDatabase {
    fn describe(&self) -> String {
        describe_reader(&self.reader)
    }

    fn lookup(&self, address: IpAddr) -> Result<Option<GeoRecord>> {
        let record = lookup_record::<geoip2::Asn>(&self.reader, address)?;
        Ok(record.map(|asn| GeoRecord {
            location: LocationInfo::NOT_FOUND,
            as_name: asn.autonomous_system_organization.map(str::to_string),
        }))
    }
}
