//! Run configuration
//!
//! Turns parsed arguments into the explicit values the engine needs. The
//! database URL is only required once jobs are actually run.

use crate::error::{CliError, Result};
use crate::Cli;
use sqldag_engine::selection::split_job_names;
use sqldag_engine::{DatabaseConfig, RunOptions};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub jobs_path: PathBuf,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub options: RunOptions,
    pub fail_on_empty: bool,
}

impl RunConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let jobs_path = cli
            .jobs
            .clone()
            .ok_or_else(|| CliError::config("--jobs is required"))?;

        Ok(Self {
            jobs_path,
            database_url: cli
                .remote_url
                .clone()
                .filter(|url| !url.trim().is_empty()),
            max_connections: cli.max_connections,
            options: RunOptions {
                selection: split_job_names(&cli.only),
                include_deps: cli.include_deps,
                stop_on_failure: cli.stop_on_failure,
            },
            fail_on_empty: cli.fail_on_empty,
        })
    }

    /// Connection settings, failing when no URL was given
    pub fn database(&self) -> Result<DatabaseConfig> {
        let url = self
            .database_url
            .as_deref()
            .ok_or(CliError::MissingDatabaseUrl)?;

        let mut config = DatabaseConfig::new(url);
        config.max_connections = self.max_connections;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sqldag").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_only_accepts_commas_and_repeats() {
        let cli = parse(&[
            "--jobs",
            "jobs.yml",
            "--remote-url",
            "mysql://u:p@h/db",
            "--only",
            "a, b",
            "--only",
            "c",
            "--include-deps",
        ]);
        let config = RunConfig::from_cli(&cli).unwrap();

        assert_eq!(config.options.selection, vec!["a", "b", "c"]);
        assert!(config.options.include_deps);
        assert!(!config.fail_on_empty);
    }

    #[test]
    fn test_missing_url_is_reported_lazily() {
        let config = RunConfig {
            jobs_path: "jobs.yml".into(),
            database_url: None,
            max_connections: 2,
            options: RunOptions::default(),
            fail_on_empty: false,
        };
        assert!(matches!(config.database(), Err(CliError::MissingDatabaseUrl)));
    }

    #[test]
    fn test_database_config_carries_pool_size() {
        let config = RunConfig {
            jobs_path: "jobs.yml".into(),
            database_url: Some("mysql+pymysql://u:p@h:3306/db".into()),
            max_connections: 5,
            options: RunOptions::default(),
            fail_on_empty: false,
        };
        let db = config.database().unwrap();
        assert_eq!(db.url, "mysql://u:p@h:3306/db");
        assert_eq!(db.max_connections, 5);
    }
}
