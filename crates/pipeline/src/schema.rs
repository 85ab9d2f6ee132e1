//! Column sets of the raw and enriched logs.
//!
//! Downstream readers address columns by position, so the order here is a
//! compatibility contract. A behaviour change that alters the column set gets
//! a new [`Generation`]; existing generations never change.

use serde::Deserialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Field delimiter of both the raw and the enriched log.
pub const DELIMITER: u8 = b';';

/// A named column of the raw or enriched log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Column {
    Timestamp,
    Domain,
    NsIp,
    NsAs,
    Subnet,
    SubnetScope,
    SubnetLocation,
    ReturnedSubnet,
    Scope,
    ReturnedIps,
    IpLocations,
    AverageDistance,
}

impl Column {
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Timestamp => "timestamp",
            Column::Domain => "domain",
            Column::NsIp => "ns-ip",
            Column::NsAs => "ns-as",
            Column::Subnet => "subnet",
            Column::SubnetScope => "subnet-scope",
            Column::SubnetLocation => "subnet-location",
            Column::ReturnedSubnet => "returned-subnet",
            Column::Scope => "scope",
            Column::ReturnedIps => "returned-ips",
            Column::IpLocations => "ip-locations",
            Column::AverageDistance => "average-distance",
        }
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_COLUMNS
            .iter()
            .find(|column| column.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown column `{s}`"))
    }
}

const ALL_COLUMNS: [Column; 12] = [
    Column::Timestamp,
    Column::Domain,
    Column::NsIp,
    Column::NsAs,
    Column::Subnet,
    Column::SubnetScope,
    Column::SubnetLocation,
    Column::ReturnedSubnet,
    Column::Scope,
    Column::ReturnedIps,
    Column::IpLocations,
    Column::AverageDistance,
];

/// Columns of the raw probe log, in order.
pub const RAW_COLUMNS: [Column; 7] = [
    Column::Timestamp,
    Column::Domain,
    Column::NsIp,
    Column::Subnet,
    Column::ReturnedSubnet,
    Column::Scope,
    Column::ReturnedIps,
];

const GENERATION_1: [Column; 11] = [
    Column::Timestamp,
    Column::Domain,
    Column::NsIp,
    Column::Subnet,
    Column::SubnetScope,
    Column::SubnetLocation,
    Column::ReturnedSubnet,
    Column::Scope,
    Column::ReturnedIps,
    Column::IpLocations,
    Column::AverageDistance,
];

const GENERATION_2: [Column; 12] = [
    Column::Timestamp,
    Column::Domain,
    Column::NsIp,
    Column::NsAs,
    Column::Subnet,
    Column::SubnetScope,
    Column::SubnetLocation,
    Column::ReturnedSubnet,
    Column::Scope,
    Column::ReturnedIps,
    Column::IpLocations,
    Column::AverageDistance,
];

/// Schema generation of the enriched log.
///
/// Generation 1 resolved all five location slots from a city database.
/// Generation 2 switched to a database with country, continent and network
/// ownership only, and added the `ns-as` column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "u8")]
pub enum Generation {
    V1,
    #[default]
    V2,
}

impl Generation {
    /// Output columns, in order.
    pub fn columns(&self) -> &'static [Column] {
        match self {
            Generation::V1 => &GENERATION_1,
            Generation::V2 => &GENERATION_2,
        }
    }

    /// Position of `column` in this generation's rows.
    pub fn position(&self, column: Column) -> Option<usize> {
        self.columns().iter().position(|c| *c == column)
    }

    pub fn number(&self) -> u8 {
        match self {
            Generation::V1 => 1,
            Generation::V2 => 2,
        }
    }
}

impl TryFrom<u8> for Generation {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Generation::V1),
            2 => Ok(Generation::V2),
            other => Err(format!("unknown schema generation {other}, expected 1 or 2")),
        }
    }
}

impl Display for Generation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "generation {}", self.number())
    }
}
