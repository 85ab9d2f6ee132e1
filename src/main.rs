//! Enriches every configured probe log, then runs every configured
//! post-filter. Takes no arguments; see `ecs_config` for where settings are
//! read from.

mod error;

use crate::error::{ErrorKind, Result};
use ecs_config::Config;
use ecs_geo::GeoDatabase;
use ecs_pipeline::{RunOutcome, Transformer};
use exn::ResultExt;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let config = Config::load();
    init_logging(config.as_ref().map_or("info", |config| config.log.as_str()));

    match config.or_raise(|| ErrorKind::Config).and_then(|config| execute(&config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:?}");
            ExitCode::FAILURE
        },
    }
}

fn init_logging(directive: &str) {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|err| {
        eprintln!("invalid log directive `{directive}` ({err}); falling back to `info`");
        EnvFilter::new("info")
    });
    // Logs go to stderr so nothing interleaves with piped output.
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn execute(config: &Config) -> Result<()> {
    if config.jobs.is_empty() && config.filters.is_empty() {
        tracing::warn!("no jobs or filters configured; nothing to do");
        return Ok(());
    }
    if !config.jobs.is_empty() {
        enrich(config)?;
    }

    for filter in &config.filters {
        let outcome = ecs_pipeline::filter(
            &filter.input,
            &filter.output,
            &filter.rule(),
            config.generation,
            filter.truncate,
        )
        .or_raise(|| ErrorKind::Filter(filter.input.clone()))?;
        if let RunOutcome::Skipped(output) = outcome {
            tracing::info!(output = %output.display(), "skipped post-filter; output already exists");
        }
    }
    Ok(())
}

/// Run every enrichment job against one database handle and one set of caches.
fn enrich(config: &Config) -> Result<()> {
    // Opened up front so a bad path fails before any output is touched.
    let database = config
        .database_kind()
        .open(&config.database.path, config.database.asn_path.as_deref())
        .or_raise(|| ErrorKind::Database)?;
    tracing::info!(database = %database.describe(), generation = %config.generation, "database opened");

    let mut transformer = Transformer::new(database, config.transform_options());
    for job in &config.jobs {
        let outcome = ecs_pipeline::run(&mut transformer, &job.input, &job.output, config.chunk_rows, job.truncate)
            .or_raise(|| ErrorKind::Enrich(job.input.clone()))?;
        if let RunOutcome::Skipped(output) = outcome {
            tracing::info!(output = %output.display(), "skipped enrichment; output already exists");
        }
    }
    Ok(())
}
