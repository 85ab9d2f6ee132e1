use crate::error::{ErrorKind, Result};
use crate::literal::{LocationLiteral, LocationsLiteral, parse_location, parse_locations};
use crate::schema::{Column, Generation, RAW_COLUMNS};
use csv::StringRecord;
use ecs_geo::LocationInfo;
use std::borrow::Cow;

/// One line of the raw probe log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub timestamp: String,
    pub domain: String,
    pub nameserver_ip: String,
    /// `address/prefix_length` as sent in the ECS option.
    pub queried_subnet: String,
    /// Present only when the server echoed an ECS option.
    pub returned_subnet: Option<String>,
    pub returned_scope: Option<u8>,
    /// Comma-joined answer addresses; `None` when the field is empty.
    pub returned_ips: Option<String>,
}

impl RawRecord {
    /// Build from a parsed line. Missing trailing fields read as empty.
    pub fn from_record(record: &StringRecord) -> Self {
        let field = |column: Column| {
            RAW_COLUMNS
                .iter()
                .position(|c| *c == column)
                .and_then(|i| record.get(i))
                .unwrap_or_default()
        };
        Self {
            timestamp: field(Column::Timestamp).to_string(),
            domain: field(Column::Domain).to_string(),
            nameserver_ip: field(Column::NsIp).to_string(),
            queried_subnet: field(Column::Subnet).to_string(),
            returned_subnet: non_empty(field(Column::ReturnedSubnet)),
            returned_scope: parse_scope(field(Column::Scope)),
            returned_ips: non_empty(field(Column::ReturnedIps)),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Scope is written by some producers as a float (`24.0`).
fn parse_scope(value: &str) -> Option<u8> {
    if value.is_empty() {
        return None;
    }
    let parsed = value
        .parse::<f64>()
        .ok()
        .filter(|scope| scope.fract() == 0.0 && (0.0..=f64::from(u8::MAX)).contains(scope))
        .map(|scope| scope as u8);
    if parsed.is_none() {
        tracing::warn!(scope = value, "unparseable scope; treating as absent");
    }
    parsed
}

/// One line of the enriched log.
///
/// Raw fields are carried through verbatim; the derived fields are `None`
/// when they could not be computed (or, for `ns_as`, when the schema
/// generation has no such column).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichedRecord {
    pub timestamp: String,
    pub domain: String,
    pub nameserver_ip: String,
    pub ns_as: Option<String>,
    /// Address part of the queried subnet, or the whole field if it had no `/`.
    pub subnet_address: String,
    pub subnet_prefix_length: Option<u8>,
    pub subnet_location: Option<LocationInfo>,
    pub returned_subnet: Option<String>,
    pub returned_scope: Option<u8>,
    pub returned_ips: Option<String>,
    /// `None` when the probe got no answer addresses at all, which is not
    /// the same as an answer whose addresses were all unresolvable.
    pub returned_ip_locations: Option<Vec<LocationInfo>>,
    pub average_distance_km: Option<f64>,
}

impl EnrichedRecord {
    /// Text of a single column. Absent values are empty.
    pub fn field(&self, column: Column) -> Cow<'_, str> {
        fn opt(value: &Option<String>) -> Cow<'_, str> {
            Cow::Borrowed(value.as_deref().unwrap_or_default())
        }
        fn display(value: Option<impl ToString>) -> Cow<'static, str> {
            value.map_or(Cow::Borrowed(""), |v| Cow::Owned(v.to_string()))
        }

        match column {
            Column::Timestamp => Cow::Borrowed(&self.timestamp),
            Column::Domain => Cow::Borrowed(&self.domain),
            Column::NsIp => Cow::Borrowed(&self.nameserver_ip),
            Column::NsAs => opt(&self.ns_as),
            Column::Subnet => Cow::Borrowed(&self.subnet_address),
            Column::SubnetScope => display(self.subnet_prefix_length),
            Column::SubnetLocation => display(self.subnet_location.as_ref().map(LocationLiteral)),
            Column::ReturnedSubnet => opt(&self.returned_subnet),
            Column::Scope => display(self.returned_scope),
            Column::ReturnedIps => opt(&self.returned_ips),
            Column::IpLocations => display(self.returned_ip_locations.as_deref().map(LocationsLiteral)),
            Column::AverageDistance => display(self.average_distance_km.map(|km| format!("{km:?}"))),
        }
    }

    /// All fields of this record, in the column order of `generation`.
    pub fn fields(&self, generation: Generation) -> impl Iterator<Item = Cow<'_, str>> {
        generation.columns().iter().map(|column| self.field(*column))
    }

    /// Parse one enriched line written under `generation`.
    pub fn from_record(record: &StringRecord, generation: Generation) -> Result<Self> {
        let columns = generation.columns();
        if record.len() != columns.len() {
            exn::bail!(ErrorKind::Schema(format!(
                "{generation} has {} columns, found {}",
                columns.len(),
                record.len()
            )));
        }

        let mut enriched = EnrichedRecord::default();
        for (column, value) in columns.iter().zip(record.iter()) {
            match column {
                Column::Timestamp => enriched.timestamp = value.to_string(),
                Column::Domain => enriched.domain = value.to_string(),
                Column::NsIp => enriched.nameserver_ip = value.to_string(),
                Column::NsAs => enriched.ns_as = non_empty(value),
                Column::Subnet => enriched.subnet_address = value.to_string(),
                Column::SubnetScope => enriched.subnet_prefix_length = parse_number(*column, value)?,
                Column::SubnetLocation => {
                    enriched.subnet_location = (!value.is_empty()).then(|| parse_location(value)).transpose()?
                },
                Column::ReturnedSubnet => enriched.returned_subnet = non_empty(value),
                Column::Scope => enriched.returned_scope = parse_number(*column, value)?,
                Column::ReturnedIps => enriched.returned_ips = non_empty(value),
                Column::IpLocations => {
                    enriched.returned_ip_locations = (!value.is_empty()).then(|| parse_locations(value)).transpose()?
                },
                Column::AverageDistance => enriched.average_distance_km = parse_number(*column, value)?,
            }
        }
        Ok(enriched)
    }
}

fn parse_number<T: std::str::FromStr>(column: Column, value: &str) -> Result<Option<T>> {
    if value.is_empty() {
        return Ok(None);
    }
    match value.parse() {
        Ok(number) => Ok(Some(number)),
        Err(_) => exn::bail!(ErrorKind::Schema(format!("invalid {column} value `{value}`"))),
    }
}
