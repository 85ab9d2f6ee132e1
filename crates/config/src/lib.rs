//! Layered configuration for the enrichment runner.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults,
//! 2. `config.{toml,yaml,json}` in the platform configuration directory,
//! 3. `ecs-enrich.{toml,yaml,json}` in the working directory,
//! 4. `ECS_ENRICH_DATABASE`, which overrides `database.path`.
//!
//! ```toml
//! generation = 2
//! chunk_rows = 5_000_000
//!
//! [database]
//! path = "ipinfo_lite.mmdb"
//!
//! [[jobs]]
//! input = "scan_2024-01-20_01-00_UTC.csv.gz"
//! output = "enriched_2024-01-20.csv.gz"
//!
//! [[filters]]
//! input = "enriched_2024-01-20.csv.gz"
//! output = "enriched_2024-01-20_no_cloudflare.csv.gz"
//! exclude = "Cloudflare"
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use ecs_geo::DatabaseKind;
use ecs_pipeline::{Column, FilterRule, Generation, TransformOptions};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Toml, Yaml};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const APPLICATION: &str = "ecs-enrich";
const ENV_PREFIX: &str = "ECS_ENRICH_";
const EXTENSIONS: [&str; 3] = ["toml", "yaml", "json"];

/// Everything a run needs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// `tracing` filter directive, e.g. `info` or `ecs_pipeline=debug`.
    pub log: String,
    pub generation: Generation,
    pub compute_distance: bool,
    /// Rows per batch. Bounds memory; each batch becomes one compressed member.
    pub chunk_rows: usize,
    pub database: DatabaseConfig,
    /// Enrichment runs, in order.
    pub jobs: Vec<EnrichJob>,
    /// Post-filter runs, after all enrichment runs.
    pub filters: Vec<FilterJob>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log: "info".to_string(),
            generation: Generation::default(),
            compute_distance: false,
            chunk_rows: 5_000_000,
            database: DatabaseConfig::default(),
            jobs: Vec::new(),
            filters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Defaults to the product each generation was built on.
    pub kind: Option<DatabaseKind>,
    pub path: PathBuf,
    /// Optional GeoLite2-ASN file providing AS names.
    pub asn_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnrichJob {
    pub input: PathBuf,
    pub output: PathBuf,
    #[serde(default)]
    pub truncate: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterJob {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Lines containing this text are dropped.
    pub exclude: String,
    /// Only look for `exclude` inside this column instead of the whole line.
    #[serde(default)]
    pub column: Option<Column>,
    #[serde(default)]
    pub truncate: bool,
}

impl FilterJob {
    pub fn rule(&self) -> FilterRule {
        match self.column {
            Some(column) => FilterRule::column(column, &self.exclude),
            None => FilterRule::substring(&self.exclude),
        }
    }
}

impl Config {
    /// Load from the default locations and validate.
    pub fn load() -> Result<Self> {
        Self::from_files(&default_files())
    }

    /// Load from `files` (later files win) plus the environment, and validate.
    /// Missing files are skipped.
    pub fn from_files(files: &[PathBuf]) -> Result<Self> {
        let config: Config = Self::figment(files).extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    fn figment(files: &[PathBuf]) -> Figment {
        let figment = files.iter().fold(Figment::new(), |figment, path| merge_file(figment, path));
        figment.merge(Env::prefixed(ENV_PREFIX).only(&["database"]).map(|_| "database.path".into()))
    }

    /// Check what deserialization can't.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_rows == 0 {
            exn::bail!(ErrorKind::Invalid("chunk_rows must be greater than zero".to_string()));
        }
        if self.database.path.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid(format!(
                "database.path is required (or set {ENV_PREFIX}DATABASE)"
            )));
        }
        for job in &self.jobs {
            if job.input == job.output {
                exn::bail!(ErrorKind::Invalid(format!("job reads and writes {}", job.input.display())));
            }
        }
        for filter in &self.filters {
            if filter.exclude.is_empty() {
                exn::bail!(ErrorKind::Invalid(format!(
                    "filter of {} has an empty exclude",
                    filter.input.display()
                )));
            }
            if filter.input == filter.output {
                exn::bail!(ErrorKind::Invalid(format!("filter reads and writes {}", filter.input.display())));
            }
            if let Some(column) = filter.column
                && self.generation.position(column).is_none()
            {
                exn::bail!(ErrorKind::Invalid(format!(
                    "filter column `{column}` does not exist in {}",
                    self.generation
                )));
            }
        }
        Ok(())
    }

    /// Database product to open, explicit or implied by the generation.
    pub fn database_kind(&self) -> DatabaseKind {
        self.database.kind.unwrap_or(match self.generation {
            Generation::V1 => DatabaseKind::GeoLite2City,
            Generation::V2 => DatabaseKind::IpinfoLite,
        })
    }

    pub fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            generation: self.generation,
            compute_distance: self.compute_distance,
        }
    }
}

fn merge_file(figment: Figment, path: &Path) -> Figment {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => figment.merge(Toml::file(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        _ => {
            tracing::warn!(path = %path.display(), "ignoring configuration file of unknown format");
            figment
        },
    }
}

/// Candidate configuration files, lowest precedence first.
pub fn default_files() -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Some(dirs) = ProjectDirs::from("", "", APPLICATION) {
        files.extend(EXTENSIONS.iter().map(|ext| dirs.config_dir().join(format!("config.{ext}"))));
    }
    files.extend(EXTENSIONS.iter().map(|ext| PathBuf::from(format!("{APPLICATION}.{ext}"))));
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    fn local_files() -> Vec<PathBuf> {
        EXTENSIONS.iter().map(|ext| PathBuf::from(format!("{APPLICATION}.{ext}"))).collect()
    }

    fn valid() -> Config {
        Config {
            database: DatabaseConfig { path: "ipinfo_lite.mmdb".into(), ..DatabaseConfig::default() },
            ..Config::default()
        }
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.log, "info");
        assert_eq!(config.generation, Generation::V2);
        assert!(!config.compute_distance);
        assert_eq!(config.chunk_rows, 5_000_000);
        assert_eq!(config.database_kind(), DatabaseKind::IpinfoLite);
    }

    #[test]
    fn loads_toml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "ecs-enrich.toml",
                r#"
                    generation = 1
                    compute_distance = true
                    chunk_rows = 1000

                    [database]
                    path = "GeoLite2-City.mmdb"
                    asn_path = "GeoLite2-ASN.mmdb"

                    [[jobs]]
                    input = "scan.csv.gz"
                    output = "enriched.csv.gz"

                    [[filters]]
                    input = "enriched.csv.gz"
                    output = "filtered.csv.gz"
                    exclude = "Cloudflare"
                    truncate = true
                "#,
            )?;
            let config = Config::from_files(&local_files()).map_err(|e| e.to_string())?;
            assert_eq!(config.generation, Generation::V1);
            assert_eq!(config.chunk_rows, 1000);
            assert_eq!(config.database_kind(), DatabaseKind::GeoLite2City);
            assert_eq!(config.database.asn_path, Some(PathBuf::from("GeoLite2-ASN.mmdb")));
            assert_eq!(config.jobs, [EnrichJob {
                input: "scan.csv.gz".into(),
                output: "enriched.csv.gz".into(),
                truncate: false,
            }]);
            assert_eq!(config.filters[0].rule(), FilterRule::substring("Cloudflare"));
            assert!(config.filters[0].truncate);
            assert_eq!(
                config.transform_options(),
                TransformOptions { generation: Generation::V1, compute_distance: true }
            );
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_database_path() {
        Jail::expect_with(|jail| {
            jail.create_file("ecs-enrich.toml", "[database]\npath = \"from-file.mmdb\"\nkind = \"geolite2-city\"")?;
            jail.set_env("ECS_ENRICH_DATABASE", "/srv/from-env.mmdb");
            jail.set_env("ECS_ENRICH_CHUNK_ROWS", "7");
            let config = Config::from_files(&local_files()).map_err(|e| e.to_string())?;
            assert_eq!(config.database.path, PathBuf::from("/srv/from-env.mmdb"));
            assert_eq!(config.database.kind, Some(DatabaseKind::GeoLite2City));
            // Only the database path is read from the environment.
            assert_eq!(config.chunk_rows, 5_000_000);
            Ok(())
        });
    }

    #[test]
    fn loads_yaml_with_column_filter() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "ecs-enrich.yaml",
                "database:\n  path: lite.mmdb\nfilters:\n  - input: a.csv.gz\n    output: b.csv.gz\n    exclude: Cloudflare\n    column: ns-as\n",
            )?;
            let config = Config::from_files(&local_files()).map_err(|e| e.to_string())?;
            assert_eq!(config.filters[0].rule(), FilterRule::column(Column::NsAs, "Cloudflare"));
            Ok(())
        });
    }

    #[rstest]
    #[case::unknown_generation("generation = 3\n[database]\npath = \"x.mmdb\"")]
    #[case::unknown_key("chunk_size = 3\n[database]\npath = \"x.mmdb\"")]
    #[case::unknown_column(
        "[database]\npath = \"x.mmdb\"\n[[filters]]\ninput = \"a\"\noutput = \"b\"\nexclude = \"c\"\ncolumn = \"ns_as\""
    )]
    fn unparseable_configuration_fails_to_load(#[case] content: &str) {
        Jail::expect_with(|jail| {
            jail.create_file("ecs-enrich.toml", content)?;
            let err = Config::from_files(&local_files()).unwrap_err();
            assert_eq!(*err, ErrorKind::Load);
            Ok(())
        });
    }

    #[test]
    fn missing_files_yield_defaults_and_need_a_database() {
        Jail::expect_with(|_| {
            let err = Config::from_files(&local_files()).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid(message) if message.contains("database.path")));
            Ok(())
        });
    }

    #[rstest]
    #[case::zero_chunk(Config { chunk_rows: 0, ..valid() })]
    #[case::no_database(Config::default())]
    #[case::in_place_job(Config {
        jobs: vec![EnrichJob { input: "a".into(), output: "a".into(), truncate: false }],
        ..valid()
    })]
    #[case::empty_exclude(Config {
        filters: vec![FilterJob {
            input: "a".into(),
            output: "b".into(),
            exclude: String::new(),
            column: None,
            truncate: false,
        }],
        ..valid()
    })]
    #[case::column_missing_in_generation(Config {
        generation: Generation::V1,
        filters: vec![FilterJob {
            input: "a".into(),
            output: "b".into(),
            exclude: "Cloudflare".to_string(),
            column: Some(Column::NsAs),
            truncate: false,
        }],
        ..valid()
    })]
    fn invalid(#[case] config: Config) {
        let err = config.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn valid_configuration_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn default_files_end_with_working_directory() {
        let files = default_files();
        assert_eq!(&files[files.len() - 3..], local_files().as_slice());
    }
}
