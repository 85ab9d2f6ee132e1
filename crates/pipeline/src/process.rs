//! Chunked enrichment of a whole log.

use crate::error::{ErrorKind, Result};
use crate::io::{PartialOutput, RunOutcome, csv_reader, csv_writer, open_input, skip_output};
use crate::record::RawRecord;
use crate::transform::{TransformStats, Transformer};
use ecs_compress::Compression;
use ecs_geo::{CacheStats, GeoDatabase};
use exn::ResultExt;
use std::io::Write;
use std::path::Path;
use tracing::instrument;

/// What one enrichment run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub rows: u64,
    pub batches: u64,
    pub input_compression: Compression,
    pub output_compression: Compression,
    /// Row-level degradations of this run only.
    pub transform: TransformStats,
    /// Cache counters since the transformer was created; caches outlive runs.
    pub locations: CacheStats,
    pub distances: CacheStats,
}

/// Enrich `input` into `output`, `chunk_rows` rows at a time.
///
/// The output is a strict positional transform of the input: same rows,
/// same order, one output row per input row. Each batch is compressed as a
/// separate member (format chosen by the output's extension) and appended
/// with a single write.
///
/// An existing `output` is left untouched unless `truncate` is set, and even
/// then it is only replaced once the run has completed. A failed run leaves
/// no trace, so an existing output is always complete.
///
/// # Errors
/// - [`ErrorKind::Input`] if the input can't be opened or read to the end
/// - [`ErrorKind::Compression`] if the input is corrupt compressed data
/// - [`ErrorKind::Output`] if the output can't be written or moved into place
#[instrument(skip_all, fields(input = %input.display(), output = %output.display(), chunk_rows = chunk_rows))]
pub fn run<D: GeoDatabase>(
    transformer: &mut Transformer<D>,
    input: &Path,
    output: &Path,
    chunk_rows: usize,
    truncate: bool,
) -> Result<RunOutcome<RunSummary>> {
    if skip_output(output, truncate)? {
        return Ok(RunOutcome::Skipped(output.to_path_buf()));
    }
    let (input_compression, reader) = open_input(input)?;
    let mut partial = PartialOutput::create(output)?;
    let output_compression = Compression::from_path(output);
    let generation = transformer.generation();
    let chunk_rows = chunk_rows.max(1);
    let before = transformer.stats();

    let mut summary = RunSummary {
        input_compression,
        output_compression,
        ..RunSummary::default()
    };
    let mut records = csv_reader(reader).into_records();
    loop {
        let mut writer = csv_writer(output_compression.encoder(Vec::new()));
        let mut rows = 0u64;
        for record in records.by_ref().take(chunk_rows) {
            let record = record.or_raise(|| ErrorKind::Input(input.to_path_buf()))?;
            let enriched = transformer.transform(RawRecord::from_record(&record));
            for field in enriched.fields(generation) {
                writer.write_field(field.as_bytes()).or_raise(|| ErrorKind::Csv)?;
            }
            writer.write_record(None::<&[u8]>).or_raise(|| ErrorKind::Csv)?;
            rows += 1;
        }
        if rows == 0 {
            break;
        }

        let encoder = writer.into_inner().map_err(|e| e.into_error()).or_raise(|| ErrorKind::Csv)?;
        let batch = encoder.finish().map_err(ErrorKind::compression)?;
        partial.write_all(&batch).or_raise(|| ErrorKind::Output(partial.target().to_path_buf()))?;

        summary.rows += rows;
        summary.batches += 1;
        tracing::info!(batch = summary.batches - 1, rows, total_rows = summary.rows, "batch completed");

        if rows < chunk_rows as u64 {
            break;
        }
    }
    let output = partial.commit()?;

    summary.transform = transformer.stats() - before;
    summary.locations = transformer.resolver().stats();
    summary.distances = transformer.distances().stats();
    tracing::info!(
        output = %output.display(),
        rows = summary.rows,
        batches = summary.batches,
        malformed_subnets = summary.transform.malformed_subnets,
        skipped_ips = summary.transform.skipped_ips,
        location_cache = %summary.locations,
        distance_cache = %summary.distances,
        "enrichment completed",
    );
    Ok(RunOutcome::Completed(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_enriched;
    use crate::schema::Generation;
    use crate::transform::TransformOptions;
    use ecs_geo::LocationInfo;
    use ecs_geo::database::MockDatabase;
    use rstest::{fixture, rstest};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const PROBE_ROW: &str = "2024-01-20T01:00:00;example.com;8.8.8.8;1.2.3.0/24;;;9.9.9.9,8.8.4.4";

    fn location(latitude: f64, longitude: f64, country: &str, radius: u16, continent: &str) -> LocationInfo {
        LocationInfo {
            latitude: Some(latitude),
            longitude: Some(longitude),
            country_code: Some(country.to_string()),
            accuracy_radius_km: Some(radius),
            continent_code: Some(continent.to_string()),
        }
    }

    #[fixture]
    fn transformer() -> Transformer<MockDatabase> {
        let database = MockDatabase::new()
            .with_location("1.2.3.0", location(50.0, 10.0, "DE", 50, "EU"))
            .with_location("9.9.9.9", location(40.0, -75.0, "US", 100, "NA"));
        Transformer::new(database, TransformOptions { generation: Generation::V1, compute_distance: true })
    }

    /// Numbered raw rows, some without answers and one with a broken subnet.
    fn raw_log(rows: usize) -> String {
        (0..rows)
            .map(|i| match i % 3 {
                0 => format!("2024-01-20T01:00:{i:02};domain{i}.example;8.8.8.8;1.2.3.0/24;;;9.9.9.9,8.8.4.4\n"),
                1 => format!("2024-01-20T01:00:{i:02};domain{i}.example;8.8.8.8;5.6.7.0/24;5.6.7.0/24;24.0;\n"),
                _ => format!("2024-01-20T01:00:{i:02};domain{i}.example;8.8.8.8;garbage;;;9.9.9.9\n"),
            })
            .collect()
    }

    fn write_input(dir: &TempDir, name: &str, content: &str, compression: Compression) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, compression.compress(content.as_bytes()).unwrap()).unwrap();
        path
    }

    fn decompressed(path: &Path) -> String {
        let bytes = fs::read(path).unwrap();
        let format = Compression::from_magic_bytes(&bytes);
        String::from_utf8(format.decompress(&bytes).unwrap()).unwrap()
    }

    #[rstest]
    fn enriches_probe_row(mut transformer: Transformer<MockDatabase>) {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir, "scan.csv.gz", &format!("{PROBE_ROW}\n"), Compression::Gzip);
        let output = dir.path().join("enriched.csv.gz");

        let outcome = run(&mut transformer, &input, &output, 10, false).unwrap();
        assert_eq!(outcome.summary().map(|s| s.rows), Some(1));

        let text = decompressed(&output);
        assert!(text.starts_with(
            "2024-01-20T01:00:00;example.com;8.8.8.8;1.2.3.0;24;(50.0, 10.0, 'DE', 50, 'EU');;;9.9.9.9,8.8.4.4;\
             [(40.0, -75.0, 'US', 100, 'NA'), (None, None, None, None, None)];6425.78"
        ), "{text}");
        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 1);
    }

    #[rstest]
    #[case::exact_multiple(9, 3, 3)]
    #[case::short_last_batch(10, 3, 4)]
    #[case::single_batch(10, 100, 1)]
    #[case::one_row_batches(4, 1, 4)]
    fn preserves_rows_and_order(
        mut transformer: Transformer<MockDatabase>,
        #[case] rows: usize,
        #[case] chunk_rows: usize,
        #[case] batches: u64,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir, "scan.csv", &raw_log(rows), Compression::None);
        let output = dir.path().join("enriched.csv.gz");

        let summary = run(&mut transformer, &input, &output, chunk_rows, false).unwrap();
        let summary = summary.summary().unwrap();
        assert_eq!(summary.rows, rows as u64);
        assert_eq!(summary.batches, batches);
        assert_eq!(summary.input_compression, Compression::None);
        assert_eq!(summary.output_compression, Compression::Gzip);

        let records: Vec<_> = read_enriched(&output, Generation::V1).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), rows);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.domain, format!("domain{i}.example"));
        }
        assert_eq!(records[1].returned_ip_locations, None);
        assert_eq!(records[1].returned_scope, Some(24));
    }

    #[rstest]
    #[case::single_batch(6, 10, 1)]
    #[case::short_last_batch(7, 3, 3)]
    fn generation_two_output_reads_back(#[case] rows: usize, #[case] chunk_rows: usize, #[case] batches: u64) {
        let database = MockDatabase::new()
            .with_location("1.2.3.0", location(50.0, 10.0, "DE", 50, "EU"))
            .with_as_name("8.8.8.8", "GOOGLE");
        let mut transformer = Transformer::new(database, TransformOptions::default());
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir, "scan.csv", &raw_log(rows), Compression::None);
        let output = dir.path().join("enriched.csv.bz2");

        let outcome = run(&mut transformer, &input, &output, chunk_rows, false).unwrap();
        assert_eq!(outcome.summary().map(|s| (s.rows, s.batches)), Some((rows as u64, batches)));

        let text = decompressed(&output);
        for line in text.lines() {
            let fields: Vec<_> = line.split(';').collect();
            assert_eq!(fields.len(), Generation::V2.columns().len());
            assert_eq!(fields[3], "GOOGLE");
        }

        let records: Vec<_> = read_enriched(&output, Generation::V2).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), rows);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.domain, format!("domain{i}.example"));
            assert_eq!(record.ns_as.as_deref(), Some("GOOGLE"));
        }
        assert_eq!(records[0].subnet_location.as_ref().and_then(|l| l.country_code.as_deref()), Some("DE"));
        assert_eq!(records[0].average_distance_km, None);
    }

    #[rstest]
    fn counts_row_level_problems(mut transformer: Transformer<MockDatabase>) {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir, "scan.csv.bz2", &raw_log(6), Compression::Bzip2);
        let output = dir.path().join("enriched.csv");

        let outcome = run(&mut transformer, &input, &output, 4, false).unwrap();
        let summary = outcome.summary().unwrap();
        assert_eq!(summary.input_compression, Compression::Bzip2);
        assert_eq!(summary.output_compression, Compression::None);
        assert_eq!(summary.transform.malformed_subnets, 2);
        assert_eq!(summary.transform.rows, 6);
        assert!(summary.locations.hits > 0);
        assert_eq!(fs::read_to_string(&output).unwrap().lines().count(), 6);
    }

    #[rstest]
    fn existing_output_is_not_touched(mut transformer: Transformer<MockDatabase>) {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir, "scan.csv", &raw_log(5), Compression::None);
        let output = dir.path().join("enriched.csv.gz");

        assert!(!run(&mut transformer, &input, &output, 2, false).unwrap().is_skipped());
        let first = fs::read(&output).unwrap();
        let queries = transformer.resolver().database().queries();

        let again = run(&mut transformer, &input, &output, 2, false).unwrap();
        assert_eq!(again, RunOutcome::Skipped(output.clone()));
        assert_eq!(fs::read(&output).unwrap(), first);
        assert_eq!(transformer.resolver().database().queries(), queries);
    }

    #[rstest]
    fn truncate_rewrites_output(mut transformer: Transformer<MockDatabase>) {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir, "scan.csv", &raw_log(3), Compression::None);
        let output = dir.path().join("enriched.csv");
        fs::write(&output, "stale\n").unwrap();

        let outcome = run(&mut transformer, &input, &output, 2, true).unwrap();
        assert_eq!(outcome.summary().map(|s| s.rows), Some(3));
        let text = fs::read_to_string(&output).unwrap();
        assert!(!text.contains("stale"));
        assert_eq!(text.lines().count(), 3);
    }

    #[rstest]
    fn interrupted_run_is_redone(mut transformer: Transformer<MockDatabase>) {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir, "scan.csv", &raw_log(3), Compression::None);
        let output = dir.path().join("enriched.csv");
        fs::write(dir.path().join("enriched.csv.partial"), "half\n").unwrap();

        let outcome = run(&mut transformer, &input, &output, 2, false).unwrap();
        assert_eq!(outcome.summary().map(|s| s.rows), Some(3));
        assert!(!dir.path().join("enriched.csv.partial").exists());
    }

    #[rstest]
    fn empty_input_gives_empty_output(mut transformer: Transformer<MockDatabase>) {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir, "scan.csv", "", Compression::None);
        let output = dir.path().join("enriched.csv.gz");

        let outcome = run(&mut transformer, &input, &output, 2, false).unwrap();
        assert_eq!(outcome.summary().map(|s| (s.rows, s.batches)), Some((0, 0)));
        assert_eq!(fs::read(&output).unwrap().len(), 0);
    }

    #[rstest]
    fn missing_input_leaves_no_output(mut transformer: Transformer<MockDatabase>) {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("enriched.csv.gz");

        let err = run(&mut transformer, &dir.path().join("absent.csv"), &output, 2, false).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Input(_)));
        assert!(!output.exists());
        assert!(!dir.path().join("enriched.csv.gz.partial").exists());
    }

    #[rstest]
    fn missing_input_keeps_previous_output(mut transformer: Transformer<MockDatabase>) {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("enriched.csv");
        fs::write(&output, "complete\n").unwrap();

        let err = run(&mut transformer, &dir.path().join("absent.csv"), &output, 2, true).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Input(_)));
        assert_eq!(fs::read_to_string(&output).unwrap(), "complete\n");
        assert!(!dir.path().join("enriched.csv.partial").exists());
    }

    #[rstest]
    fn corrupt_input_leaves_no_output(mut transformer: Transformer<MockDatabase>) {
        let dir = tempfile::tempdir().unwrap();
        let mut compressed = Compression::Gzip.compress(raw_log(50).as_bytes()).unwrap();
        compressed.truncate(compressed.len() / 2);
        let input = dir.path().join("scan.csv.gz");
        fs::write(&input, compressed).unwrap();
        let output = dir.path().join("enriched.csv.gz");

        assert!(run(&mut transformer, &input, &output, 10, false).is_err());
        assert!(!output.exists());
        assert!(!dir.path().join("enriched.csv.gz.partial").exists());
    }
}
