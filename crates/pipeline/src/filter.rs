//! Post-filtering of enriched logs.
//!
//! A line-oriented pass that drops rows matching an exclusion rule and copies
//! everything else verbatim, in order, under the input's compression. Lines
//! are never deserialized unless the rule names a column.

use crate::error::{ErrorKind, Result};
use crate::io::{PartialOutput, RunOutcome, csv_reader, open_input, skip_output};
use crate::schema::{Column, Generation};
use ecs_compress::Compression;
use exn::ResultExt;
use memchr::memmem::Finder;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::instrument;

/// Which lines a post-filter drops.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterRule {
    /// The needle occurs anywhere in the line, including inside unrelated
    /// fields: excluding `Cloudflare` also drops rows for a domain named
    /// `Cloudflare.example`.
    Substring { exclude: String },
    /// The needle occurs anywhere in the column named by `column`.
    Column { column: Column, exclude: String },
}

impl FilterRule {
    pub fn substring(needle: impl Into<String>) -> Self {
        FilterRule::Substring { exclude: needle.into() }
    }

    pub fn column(column: Column, needle: impl Into<String>) -> Self {
        FilterRule::Column { column, exclude: needle.into() }
    }

    pub fn needle(&self) -> &str {
        match self {
            FilterRule::Column { exclude, .. } | FilterRule::Substring { exclude } => exclude,
        }
    }
}

/// What one post-filter run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterSummary {
    pub lines: u64,
    pub excluded: u64,
    pub compression: Compression,
}

impl FilterSummary {
    pub fn kept(&self) -> u64 {
        self.lines - self.excluded
    }
}

/// Copy every line of `input` that does not contain `substring` to `output`.
///
/// Same exists/truncate contract as [`run`](crate::run).
pub fn filter_excluding(
    input: &Path,
    output: &Path,
    substring: &str,
    truncate: bool,
) -> Result<RunOutcome<FilterSummary>> {
    filter(input, output, &FilterRule::substring(substring), Generation::default(), truncate)
}

/// Copy every line of `input` that `rule` does not match to `output`.
///
/// `generation` locates the column of a [`FilterRule::Column`] and is ignored
/// otherwise. A line too short to have that column is kept.
///
/// # Errors
/// - [`ErrorKind::Schema`] if the rule's column doesn't exist in `generation`
/// - [`ErrorKind::Input`] / [`ErrorKind::Output`] for I/O failures
#[instrument(skip_all, fields(input = %input.display(), output = %output.display(), exclude = rule.needle()))]
pub fn filter(
    input: &Path,
    output: &Path,
    rule: &FilterRule,
    generation: Generation,
    truncate: bool,
) -> Result<RunOutcome<FilterSummary>> {
    let matcher = Matcher::new(rule, generation)?;
    if skip_output(output, truncate)? {
        return Ok(RunOutcome::Skipped(output.to_path_buf()));
    }
    let (compression, reader) = open_input(input)?;
    let mut partial = PartialOutput::create(output)?;
    let mut reader = BufReader::new(reader);
    let mut summary = FilterSummary { compression, ..FilterSummary::default() };

    let output_error = || ErrorKind::Output(output.to_path_buf());
    let mut encoder = compression.encoder(&mut partial);
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).or_raise(|| ErrorKind::Input(input.to_path_buf()))? == 0 {
            break;
        }
        summary.lines += 1;
        if matcher.excludes(&line) {
            summary.excluded += 1;
            continue;
        }
        encoder.write_all(&line).or_raise(output_error)?;
    }
    encoder.finish().map_err(ErrorKind::compression)?;
    partial.commit()?;

    tracing::info!(
        lines = summary.lines,
        excluded = summary.excluded,
        kept = summary.kept(),
        "post-filter completed",
    );
    Ok(RunOutcome::Completed(summary))
}

struct Matcher<'a> {
    finder: Finder<'a>,
    column: Option<usize>,
}

impl<'a> Matcher<'a> {
    fn new(rule: &'a FilterRule, generation: Generation) -> Result<Self> {
        let column = match rule {
            FilterRule::Substring { .. } => None,
            FilterRule::Column { column, .. } => match generation.position(*column) {
                Some(position) => Some(position),
                None => exn::bail!(ErrorKind::Schema(format!("{generation} has no `{column}` column"))),
            },
        };
        Ok(Self { finder: Finder::new(rule.needle().as_bytes()), column })
    }

    fn excludes(&self, line: &[u8]) -> bool {
        let Some(position) = self.column else {
            return self.finder.find(line).is_some();
        };
        let mut record = csv::ByteRecord::new();
        let mut reader = csv_reader(line);
        // An unreadable line has no such column; keep it.
        match reader.read_byte_record(&mut record) {
            Ok(true) => record.get(position).is_some_and(|field| self.finder.find(field).is_some()),
            _ => false,
        }
    }
}
