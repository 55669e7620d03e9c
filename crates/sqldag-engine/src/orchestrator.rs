//! Run orchestration
//!
//! Composition root of a run: the dependency graph fixes the order, selection
//! narrows it, and each job goes through the [`JobRunner`] one at a time.

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::executor::QueryExecutor;
use crate::graph::JobGraph;
use crate::job::Job;
use crate::keys::{CsvKeySource, KeySource};
use crate::mysql::MySqlExecutor;
use crate::runner::{ExecutionReport, JobRunner};
use crate::selection;
use crate::sink::{CsvSink, ResultSink};
use std::sync::Arc;
use tracing::{info, warn};

/// How a run selects and sequences jobs
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Job names to run; empty means every job
    pub selection: Vec<String>,
    /// Pull in the transitive dependencies of `selection`
    pub include_deps: bool,
    /// Skip the remaining jobs once one has failed
    pub stop_on_failure: bool,
}

/// Aggregated outcome of a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub reports: Vec<ExecutionReport>,
}

impl RunSummary {
    /// True when every job succeeded
    pub fn success(&self) -> bool {
        self.reports.iter().all(|r| r.success)
    }

    /// True when some job produced zero rows, failed jobs included
    pub fn any_empty(&self) -> bool {
        self.reports.iter().any(|r| r.rows == 0)
    }

    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|r| !r.success).count()
    }

    pub fn total_rows(&self) -> usize {
        self.reports.iter().map(|r| r.rows).sum()
    }
}

pub struct Orchestrator {
    runner: JobRunner,
}

impl Orchestrator {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        keys: Arc<dyn KeySource>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            runner: JobRunner::new(executor, keys, sink),
        }
    }

    /// MySQL executor with CSV key source and sink
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let executor = MySqlExecutor::connect(config).await?;
        Ok(Self::new(
            Arc::new(executor),
            Arc::new(CsvKeySource),
            Arc::new(CsvSink),
        ))
    }

    /// Resolve the jobs to run, in run order.
    ///
    /// Fails on unknown dependencies, cycles and unknown requested names. An
    /// empty result means the selection matched nothing.
    pub fn plan<'a>(jobs: &'a [Job], options: &RunOptions) -> Result<Vec<&'a Job>> {
        let graph = JobGraph::build(jobs)?;

        // Unknown names are reported before the order is computed.
        let selected = if options.selection.is_empty() {
            None
        } else {
            Some(selection::resolve(
                &options.selection,
                jobs,
                options.include_deps,
            )?)
        };

        let order = graph.topological_order()?;
        let ordered = match selected {
            Some(ref names) => selection::filter_order(order, names),
            None => order,
        };

        if ordered.is_empty() {
            info!("No matching jobs to run after filtering");
        } else {
            let names: Vec<&str> = ordered.iter().map(|j| j.name.as_str()).collect();
            info!(jobs = %names.join(", "), "Will run jobs in order");
        }
        Ok(ordered)
    }

    /// Plan and run. Errors here are fatal and happen before any job starts.
    ///
    /// Callers that must plan before they can build an orchestrator use
    /// [`Orchestrator::plan`] followed by [`Orchestrator::run_ordered`].
    pub async fn run(&self, jobs: &[Job], options: &RunOptions) -> Result<RunSummary> {
        let ordered = Self::plan(jobs, options)?;
        Ok(self.run_ordered(&ordered, options.stop_on_failure).await)
    }

    /// Run jobs in the given order, one at a time.
    pub async fn run_ordered(&self, ordered: &[&Job], stop_on_failure: bool) -> RunSummary {
        let mut summary = RunSummary {
            reports: Vec::with_capacity(ordered.len()),
        };
        let mut halted_by: Option<String> = None;

        for job in ordered {
            if let Some(ref failed) = halted_by {
                warn!(job = %job.name, failed = %failed, "Skipping job after earlier failure");
                summary.reports.push(ExecutionReport::skipped(
                    job,
                    format!("skipped because job '{}' failed", failed),
                ));
                continue;
            }

            let report = self.runner.run(job).await;
            if !report.success && stop_on_failure {
                halted_by = Some(report.job.clone());
            }
            summary.reports.push(report);
        }

        info!(
            total = summary.reports.len(),
            failed = summary.failed(),
            rows = summary.total_rows(),
            "Run completed"
        );
        summary
    }
}
