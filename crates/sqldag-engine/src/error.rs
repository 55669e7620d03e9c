//! Error types for the sqldag engine
//!
//! Graph and selection errors (`UnknownDependency`, `CycleDetected`, `UnknownJob`)
//! abort a run before any job executes. Everything else is job-local: the runner
//! logs it against the job name and moves on.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// A `depends_on` entry names a job that does not exist
    #[error("Job '{job}' depends_on unknown job '{dependency}'")]
    UnknownDependency { job: String, dependency: String },

    /// The dependency graph is not a DAG
    #[error(
        "Cycle detected in job dependencies: only {ordered} of {total} jobs could be ordered (cycle: {})",
        .cycle.join(" -> ")
    )]
    CycleDetected {
        ordered: usize,
        total: usize,
        cycle: Vec<String>,
    },

    /// One or more requested job names do not exist
    #[error("Unknown job name(s): {}", .0.join(", "))]
    UnknownJob(Vec<String>),

    /// Job has neither inline SQL nor a SQL file
    #[error("Job '{0}' must include either 'sql' or 'sql_file'")]
    MissingQuerySource(String),

    /// Job has no output target
    #[error("Job '{0}' missing 'output'")]
    MissingOutput(String),

    /// Every problem found by a validation pass, reported together
    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfiguration(Vec<String>),

    /// A generated batch parameter shadows a declared job parameter
    #[error("Parameter '{0}' is declared in params but is reserved for batched key values")]
    ParameterCollision(String),

    /// Query text references a `:name` placeholder with no bound value
    #[error("No value bound for query parameter ':{0}'")]
    UnboundParameter(String),

    /// External key source lacks the requested column
    #[error("Column '{column}' not found in CSV '{}'", .path.display())]
    MissingColumn { path: PathBuf, column: String },

    /// Two batches of the same job returned different column lists
    #[error("Batch {batch} returned columns [{}] but earlier batches returned [{}]", .actual.join(", "), .expected.join(", "))]
    SchemaMismatch {
        batch: usize,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// Query execution failed in the database driver
    #[error("Query execution failed: {0}")]
    Transport(#[from] sqlx::Error),

    #[error("Failed to access '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to parse job file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl EngineError {
    /// Create a single-message configuration error
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(vec![msg.into()])
    }

    /// Create an IO error tagged with the path involved
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors that invalidate the whole run order
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnknownDependency { .. }
                | Self::CycleDetected { .. }
                | Self::UnknownJob(_)
                | Self::InvalidConfiguration(_)
                | Self::Yaml(_)
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_job_lists_every_name() {
        let err = EngineError::UnknownJob(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Unknown job name(s): a, b");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_cycle_message_includes_path() {
        let err = EngineError::CycleDetected {
            ordered: 1,
            total: 3,
            cycle: vec!["B".into(), "C".into(), "B".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("only 1 of 3"));
        assert!(msg.contains("B -> C -> B"));
    }

    #[test]
    fn test_job_local_errors_are_not_fatal() {
        assert!(!EngineError::MissingOutput("x".into()).is_fatal());
        assert!(!EngineError::ParameterCollision("id0_0".into()).is_fatal());
        assert!(!EngineError::Transport(sqlx::Error::Protocol("boom".into())).is_fatal());
    }
}
