//! Opening logs for reading and writing.
//!
//! Output is never written in place. Everything goes to a sibling
//! `<name>.partial` file that is renamed over the target once the run has
//! finished, so an existing target is always complete. A run that fails
//! removes its `.partial`; one left behind comes from a killed process.

use crate::error::{ErrorKind, Result};
use crate::schema::DELIMITER;
use ecs_compress::Compression;
use exn::ResultExt;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const PARTIAL_SUFFIX: &str = ".partial";

/// Open a log, detecting its compression from the leading bytes.
pub(crate) fn open_input(path: &Path) -> Result<(Compression, Box<dyn Read>)> {
    let file = File::open(path).or_raise(|| ErrorKind::Input(path.to_path_buf()))?;
    Compression::detect(BufReader::new(file)).map_err(ErrorKind::compression)
}

pub(crate) fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .flexible(true)
        .from_reader(reader)
}

pub(crate) fn csv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer)
}

/// How a run ended without an error.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome<S> {
    /// The output already existed and truncation was not requested.
    Skipped(PathBuf),
    Completed(S),
}

impl<S> RunOutcome<S> {
    pub fn is_skipped(&self) -> bool {
        matches!(self, RunOutcome::Skipped(_))
    }

    pub fn summary(&self) -> Option<&S> {
        match self {
            RunOutcome::Skipped(_) => None,
            RunOutcome::Completed(summary) => Some(summary),
        }
    }
}

/// Apply the exists/truncate rules to `target`. Returns `true` when the run
/// should be skipped.
///
/// Nothing is removed here: a truncated target stays in place until a
/// finished run is renamed over it.
pub(crate) fn skip_output(target: &Path, truncate: bool) -> Result<bool> {
    if !target.try_exists().or_raise(|| ErrorKind::Output(target.to_path_buf()))? {
        return Ok(false);
    }
    if truncate {
        tracing::info!(output = %target.display(), "replacing existing output");
        return Ok(false);
    }
    tracing::info!(output = %target.display(), "output already exists; nothing to do");
    Ok(true)
}

/// An output file under construction.
///
/// Dropped without [`commit`](Self::commit), the partial file is removed
/// again and the target is left as it was.
pub(crate) struct PartialOutput {
    target: PathBuf,
    partial: PathBuf,
    writer: BufWriter<File>,
    committed: bool,
}

impl PartialOutput {
    /// Open a fresh partial file next to `target`, discarding one left by
    /// an interrupted run.
    pub(crate) fn create(target: &Path) -> Result<Self> {
        let output_error = || ErrorKind::Output(target.to_path_buf());

        let partial = partial_path(target);
        if partial.try_exists().or_raise(output_error)? {
            tracing::warn!(partial = %partial.display(), "discarding output of an interrupted run");
            fs::remove_file(&partial).or_raise(output_error)?;
        }
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).or_raise(output_error)?;
        }

        let file = OpenOptions::new().write(true).create_new(true).open(&partial).or_raise(output_error)?;
        Ok(Self {
            target: target.to_path_buf(),
            partial,
            writer: BufWriter::new(file),
            committed: false,
        })
    }

    pub(crate) fn target(&self) -> &Path {
        &self.target
    }

    /// Flush everything to disk and move the file into place, replacing any
    /// existing target.
    pub(crate) fn commit(mut self) -> Result<PathBuf> {
        let output_error = || ErrorKind::Output(self.target.clone());
        self.writer.flush().or_raise(output_error)?;
        self.writer.get_ref().sync_all().or_raise(output_error)?;
        fs::rename(&self.partial, &self.target).or_raise(output_error)?;
        self.committed = true;
        Ok(self.target.clone())
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(err) = fs::remove_file(&self.partial) {
            tracing::warn!(partial = %self.partial.display(), "unable to remove unfinished output: {err}");
        }
    }
}

impl Write for PartialOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.writer.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(OsString::from).unwrap_or_default();
    name.push(PARTIAL_SUFFIX);
    target.with_file_name(name)
}
