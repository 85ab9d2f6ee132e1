use crate::error::{ErrorKind, Result};
use crate::io::{csv_reader, open_input};
use crate::record::EnrichedRecord;
use crate::schema::Generation;
use exn::ResultExt;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Streaming reader over an enriched log.
///
/// Yields one [`EnrichedRecord`] per line. Compression is detected from the
/// content, and a log made of many appended batches reads as one stream.
pub struct EnrichedRecords {
    path: PathBuf,
    generation: Generation,
    records: csv::StringRecordsIntoIter<Box<dyn Read>>,
}

/// Open an enriched log written under `generation`.
///
/// # Example
///
/// ```no_run
/// use ecs_pipeline::{Generation, read_enriched};
///
/// for record in read_enriched("enriched.csv.gz".as_ref(), Generation::V2)? {
///     let record = record?;
///     println!("{} {:?}", record.domain, record.average_distance_km);
/// }
/// # Ok::<(), ecs_pipeline::error::Error>(())
/// ```
pub fn read_enriched(path: &Path, generation: Generation) -> Result<EnrichedRecords> {
    let (_, reader) = open_input(path)?;
    Ok(EnrichedRecords {
        path: path.to_path_buf(),
        generation,
        records: csv_reader(reader).into_records(),
    })
}

impl Iterator for EnrichedRecords {
    type Item = Result<EnrichedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(err) => return Some(Err(err).or_raise(|| ErrorKind::Input(self.path.clone()))),
        };
        Some(EnrichedRecord::from_record(&record, self.generation))
    }
}
