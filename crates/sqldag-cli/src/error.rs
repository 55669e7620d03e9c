//! Error types for the sqldag CLI
//!
//! Messages are user-facing and say what to do next where there is something
//! to do. [`CliError::exit_code`] decides the process exit status.

use sqldag_engine::EngineError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    /// No connection URL on the command line or in the environment
    #[error("No database URL. Provide --remote-url or set REMOTE_DB_URL (a .env file works too).")]
    MissingDatabaseUrl,

    /// The job file parsed but lists no jobs
    #[error("No jobs found in '{}'. Add entries under the top-level 'jobs:' key.", .0.display())]
    NoJobs(PathBuf),

    /// At least one job failed
    #[error("{failed} of {total} job(s) failed. See the log above for each job's cause.")]
    JobsFailed { failed: usize, total: usize },

    /// `--fail-on-empty` was set and some job produced no rows
    #[error("Job(s) returned zero rows: {}. Remove --fail-on-empty to allow empty outputs.", .0.join(", "))]
    EmptyResults(Vec<String>),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Job loading, graph, selection or connection failure
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::MissingDatabaseUrl => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::MissingDatabaseUrl.exit_code(), 2);
        assert_eq!(CliError::JobsFailed { failed: 1, total: 3 }.exit_code(), 1);
        assert_eq!(
            CliError::from(EngineError::UnknownJob(vec!["x".into()])).exit_code(),
            1
        );
    }

    #[test]
    fn test_messages_are_actionable() {
        let msg = CliError::EmptyResults(vec!["a".into(), "b".into()]).to_string();
        assert!(msg.contains("a, b"));
        assert!(msg.contains("--fail-on-empty"));
    }
}
