//! Batch execution and result merging

use crate::batch::BatchPlan;
use crate::error::{EngineError, Result};
use crate::executor::QueryExecutor;
use crate::job::PostProcessing;
use crate::table::{Params, ResultSet};
use tracing::{debug, instrument};

impl PostProcessing {
    /// Distinct rows, then exclusions, then the include list.
    pub fn apply(&self, result: &mut ResultSet) {
        if self.drop_duplicate_rows {
            result.drop_duplicate_rows();
        }
        if let Some(ref names) = self.drop_columns {
            result.drop_columns(names);
        }
        if let Some(ref names) = self.select_columns {
            result.select_columns(names);
        }
    }
}

/// Runs a job's query and shapes the result
pub struct ResultMerger<'e> {
    executor: &'e dyn QueryExecutor,
}

impl<'e> ResultMerger<'e> {
    pub fn new(executor: &'e dyn QueryExecutor) -> Self {
        Self { executor }
    }

    /// Run one query per batch inside a single session and concatenate the
    /// results in batch order. No batches means no query and an empty result.
    #[instrument(skip_all, fields(batches = batches.len()))]
    pub async fn execute(
        &self,
        base_query: &str,
        batches: &[BatchPlan<'_>],
        declared: &Params,
        post: &PostProcessing,
    ) -> Result<ResultSet> {
        if batches.is_empty() {
            return Ok(ResultSet::default());
        }

        let mut session = self.executor.begin().await?;
        let mut merged: Option<ResultSet> = None;

        for batch in batches {
            let params = merge_params(declared, &batch.params)?;
            let sql = batch.apply_to(base_query);
            let part = session.fetch(&sql, &params).await?;
            debug!(batch = batch.index, keys = batch.keys.len(), rows = part.len(), "Batch done");

            match merged {
                None => merged = Some(part),
                Some(ref mut acc) => {
                    if acc.columns() != part.columns() {
                        return Err(EngineError::SchemaMismatch {
                            batch: batch.index,
                            expected: acc.columns().to_vec(),
                            actual: part.columns().to_vec(),
                        });
                    }
                    acc.extend_rows(part);
                },
            }
        }

        session.commit().await?;

        let mut result = merged.unwrap_or_default();
        post.apply(&mut result);
        Ok(result)
    }

    /// Run the base query once with the declared parameters.
    pub async fn execute_single(
        &self,
        base_query: &str,
        declared: &Params,
        post: &PostProcessing,
    ) -> Result<ResultSet> {
        let mut result = self.executor.fetch(base_query, declared).await?;
        post.apply(&mut result);
        Ok(result)
    }
}

fn merge_params(declared: &Params, batch: &Params) -> Result<Params> {
    if let Some(name) = batch.keys().find(|k| declared.contains_key(*k)) {
        return Err(EngineError::ParameterCollision(name.clone()));
    }
    let mut params = declared.clone();
    params.extend(batch.iter().map(|(k, v)| (k.clone(), v.clone())));
    Ok(params)
}
