//! Single-job execution
//!
//! Every failure inside a job is caught here, logged against the job name and
//! turned into a failed [`ExecutionReport`]. Nothing a job does can abort the
//! run.

use crate::batch::BatchedQueryPlanner;
use crate::error::{EngineError, Result};
use crate::executor::QueryExecutor;
use crate::job::Job;
use crate::keys::{merge_keys, KeySource};
use crate::merge::ResultMerger;
use crate::sink::ResultSink;
use crate::table::ResultSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

/// Outcome of one job
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub job: String,
    pub success: bool,
    pub rows: usize,
    pub error: Option<String>,
    pub output: Option<PathBuf>,
    pub elapsed: Duration,
}

impl ExecutionReport {
    fn succeeded(job: &Job, rows: usize, elapsed: Duration) -> Self {
        Self {
            job: job.name.clone(),
            success: true,
            rows,
            error: None,
            output: job.output.clone(),
            elapsed,
        }
    }

    pub(crate) fn failed(job: &Job, error: &EngineError, elapsed: Duration) -> Self {
        Self {
            job: job.name.clone(),
            success: false,
            rows: 0,
            error: Some(error.to_string()),
            output: job.output.clone(),
            elapsed,
        }
    }

    pub(crate) fn skipped(job: &Job, reason: impl Into<String>) -> Self {
        Self {
            job: job.name.clone(),
            success: false,
            rows: 0,
            error: Some(reason.into()),
            output: job.output.clone(),
            elapsed: Duration::ZERO,
        }
    }
}

/// Runs jobs against injected collaborators
#[derive(Clone)]
pub struct JobRunner {
    executor: Arc<dyn QueryExecutor>,
    keys: Arc<dyn KeySource>,
    sink: Arc<dyn ResultSink>,
}

impl JobRunner {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        keys: Arc<dyn KeySource>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            executor,
            keys,
            sink,
        }
    }

    #[instrument(skip_all, fields(job = %job.name))]
    pub async fn run(&self, job: &Job) -> ExecutionReport {
        let started = Instant::now();

        let Some(output) = job.output.as_deref() else {
            let err = EngineError::MissingOutput(job.name.clone());
            warn!(job = %job.name, "{}; skipping", err);
            return ExecutionReport::failed(job, &err, started.elapsed());
        };

        match self.execute(job, output).await {
            Ok(rows) => {
                info!(
                    job = %job.name,
                    rows,
                    output = %output.display(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Job finished"
                );
                ExecutionReport::succeeded(job, rows, started.elapsed())
            },
            Err(e) => {
                error!(job = %job.name, error = %e, "Job failed");
                ExecutionReport::failed(job, &e, started.elapsed())
            },
        }
    }

    async fn execute(&self, job: &Job, output: &Path) -> Result<usize> {
        let query = job
            .query
            .as_ref()
            .ok_or_else(|| EngineError::MissingQuerySource(job.name.clone()))?;
        let base_query = query.load().await?;

        let result = self.fetch(job, &base_query).await?;
        self.sink.write(&result, output)?;
        Ok(result.len())
    }

    async fn fetch(&self, job: &Job, base_query: &str) -> Result<ResultSet> {
        let merger = ResultMerger::new(self.executor.as_ref());

        // Keys of every filter go into one relation named by the first filter.
        let Some(first) = job.key_filters.first() else {
            return merger
                .execute_single(base_query, &job.params, &job.post)
                .await;
        };

        let lists = job
            .key_filters
            .iter()
            .map(|f| self.keys.read_keys(&f.path, &f.column))
            .collect::<Result<Vec<_>>>()?;
        let keys = merge_keys(lists);

        let planner =
            BatchedQueryPlanner::new(&first.relation, &first.relation_column, first.batch_size)?
                .with_cast(first.cast.clone())?;
        let batches = planner.plan(&keys);

        if batches.is_empty() {
            info!(job = %job.name, "No keys from filter source; result will be empty");
        } else {
            info!(
                job = %job.name,
                keys = keys.len(),
                batches = batches.len(),
                batch_size = planner.batch_size(),
                "Running batched query"
            );
        }

        merger
            .execute(base_query, &batches, &job.params, &job.post)
            .await
    }
}
