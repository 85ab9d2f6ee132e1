use crate::GeoRecord;
use crate::database::GeoDatabase;
use crate::error::Result;
use std::net::IpAddr;

/// Location from one database, AS name from a sibling.
///
/// The primary's own AS name wins when it has one; the secondary is only
/// consulted to fill the gap. An address absent from both is absent.
///
/// Only the primary's errors propagate. A failed secondary lookup leaves the
/// AS name empty but keeps the location.
pub struct LayeredDatabase<L, A> {
    location: L,
    ownership: A,
}

impl<L: GeoDatabase, A: GeoDatabase> LayeredDatabase<L, A> {
    pub fn new(location: L, ownership: A) -> Self {
        Self { location, ownership }
    }
}

impl<L: GeoDatabase, A: GeoDatabase> GeoDatabase for LayeredDatabase<L, A> {
    fn describe(&self) -> String {
        format!("{} + {}", self.location.describe(), self.ownership.describe())
    }

    fn lookup(&self, address: IpAddr) -> Result<Option<GeoRecord>> {
        let primary = self.location.lookup(address)?;
        if primary.as_ref().is_some_and(|r| r.as_name.is_some()) {
            return Ok(primary);
        }
        let as_name = match self.ownership.lookup(address) {
            Ok(record) => record.and_then(|r| r.as_name),
            Err(err) => {
                tracing::warn!(%address, error = %err, "AS name lookup failed; keeping location");
                None
            },
        };
        Ok(match (primary, as_name) {
            (None, None) => None,
            (primary, as_name) => {
                let mut record = primary.unwrap_or_default();
                record.as_name = as_name;
                Some(record)
            },
        })
    }
}
