//! sqldag Engine
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Dependency-ordered SQL extraction jobs with batched key filtering.
//!
//! # Overview
//!
//! - **Job model**: YAML job files validated into [`Job`]s in one pass
//! - **Graph**: Kahn ordering in declaration order, with cycle paths on failure
//! - **Selection**: run a subset of jobs, optionally with their dependency closure
//! - **Batching**: large key lists become inline `WITH` relations of bound literals
//! - **Merging**: per-batch results concatenated in batch order, then post-processed
//! - **Running**: job-local failures, sequential execution, aggregated summary
//!
//! # Example
//!
//! ```no_run
//! use sqldag_engine::{load_jobs, DatabaseConfig, Orchestrator, RunOptions};
//!
//! # async fn run() -> sqldag_engine::Result<()> {
//! let jobs = load_jobs("jobs.yml")?;
//! let orchestrator = Orchestrator::connect(&DatabaseConfig::new("mysql://u:p@db/erp")).await?;
//! let summary = orchestrator.run(&jobs, &RunOptions::default()).await?;
//! assert!(summary.success());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod executor;
pub mod graph;
pub mod job;
pub mod keys;
pub mod merge;
pub mod mysql;
pub mod orchestrator;
pub mod params;
pub mod runner;
pub mod selection;
pub mod sink;
pub mod table;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use batch::{BatchPlan, BatchedQueryPlanner, DEFAULT_BATCH_SIZE};
pub use config::{DatabaseConfig, DATABASE_URL_ENV};
pub use error::{EngineError, Result};
pub use executor::{QueryExecutor, QuerySession};
pub use graph::JobGraph;
pub use job::{load_jobs, Job, JobFile, KeyFilter, PostProcessing, QuerySource};
pub use keys::{CsvKeySource, KeySource};
pub use merge::ResultMerger;
pub use mysql::MySqlExecutor;
pub use orchestrator::{Orchestrator, RunOptions, RunSummary};
pub use runner::{ExecutionReport, JobRunner};
pub use sink::{CsvSink, ResultSink};
pub use table::{Params, ResultSet, Value};
