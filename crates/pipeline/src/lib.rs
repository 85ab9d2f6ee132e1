//! Enrichment of DNS ECS probe logs.
//!
//! A probe log has one `;`-delimited row per query: which name server was
//! asked, which client subnet was sent, and which addresses came back. This
//! crate annotates every row with the geolocation of the subnet and of each
//! answer, the name server's network operator and, optionally, the mean
//! geodesic distance between subnet and answers.
//!
//! # Architecture
//! - [`Transformer`] maps one [`RawRecord`] to one [`EnrichedRecord`]. It owns
//!   the lookup caches and never fails on bad row data.
//! - [`run`] streams a whole log through a transformer in fixed-size batches,
//!   appending each batch as one compressed member.
//! - [`filter`] and [`filter_excluding`] are a later, independent pass that
//!   drops rows from an enriched log.
//! - [`read_enriched`] parses an enriched log back into records.
//!
//! The enriched column set depends on the schema [`Generation`].

pub mod error;
mod filter;
mod io;
pub mod literal;
mod process;
mod reader;
mod record;
pub mod schema;
mod transform;

pub use crate::filter::{FilterRule, FilterSummary, filter, filter_excluding};
pub use crate::io::RunOutcome;
pub use crate::process::{RunSummary, run};
pub use crate::reader::{EnrichedRecords, read_enriched};
pub use crate::record::{EnrichedRecord, RawRecord};
pub use crate::schema::{Column, Generation};
pub use crate::transform::{TransformOptions, TransformStats, Transformer};
