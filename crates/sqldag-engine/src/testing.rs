//! In-memory collaborators for tests
//!
//! [`StubExecutor`] records every query it receives. Batched queries echo one
//! row per generated key parameter, in key order, under a single `id` column.
//! Other queries get a canned response when one matches, otherwise a single row
//! holding the bound parameters (or `value = 1` when there are none).

use crate::batch::KEY_PARAM_PREFIX;
use crate::error::{EngineError, Result};
use crate::executor::{QueryExecutor, QuerySession};
use crate::table::{Params, ResultSet, Value};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
pub struct StubExecutor {
    queries: Mutex<Vec<(String, Params)>>,
    commits: Mutex<usize>,
    responses: Vec<(String, ResultSet)>,
    fail_markers: Vec<String>,
}

impl StubExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queries containing `marker` return `result`
    pub fn respond(mut self, marker: impl Into<String>, result: ResultSet) -> Self {
        self.responses.push((marker.into(), result));
        self
    }

    /// Queries containing `marker` fail with a transport error
    pub fn fail_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_markers.push(marker.into());
        self
    }

    /// Every query received so far, with its parameters
    pub fn queries(&self) -> Vec<(String, Params)> {
        lock(&self.queries).clone()
    }

    pub fn commits(&self) -> usize {
        *lock(&self.commits)
    }

    fn answer(&self, sql: &str, params: &Params) -> Result<ResultSet> {
        lock(&self.queries).push((sql.to_string(), params.clone()));

        if let Some(marker) = self.fail_markers.iter().find(|m| sql.contains(m.as_str())) {
            return Err(EngineError::Transport(sqlx::Error::Protocol(format!(
                "stub failure on '{}'",
                marker
            ))));
        }

        let keys = key_values(params);
        if !keys.is_empty() {
            let rows = keys.into_iter().map(|v| vec![v]).collect();
            return Ok(ResultSet::from_rows(vec!["id".to_string()], rows));
        }

        if let Some((_, result)) = self.responses.iter().find(|(m, _)| sql.contains(m.as_str())) {
            return Ok(result.clone());
        }

        if params.is_empty() {
            return Ok(ResultSet::from_rows(vec!["value".into()], vec![vec![Value::Int(1)]]));
        }
        Ok(ResultSet::from_rows(
            params.keys().cloned().collect(),
            vec![params.values().cloned().collect()],
        ))
    }
}

#[async_trait]
impl QueryExecutor for StubExecutor {
    async fn fetch(&self, sql: &str, params: &Params) -> Result<ResultSet> {
        self.answer(sql, params)
    }

    async fn begin(&self) -> Result<Box<dyn QuerySession + '_>> {
        Ok(Box::new(StubSession { stub: self }))
    }
}

struct StubSession<'a> {
    stub: &'a StubExecutor,
}

#[async_trait]
impl QuerySession for StubSession<'_> {
    async fn fetch(&mut self, sql: &str, params: &Params) -> Result<ResultSet> {
        self.stub.answer(sql, params)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        *lock(&self.stub.commits) += 1;
        Ok(())
    }
}

/// Generated key parameters ordered by (batch, position)
fn key_values(params: &Params) -> Vec<Value> {
    let mut keyed: Vec<((usize, usize), &Value)> = params
        .iter()
        .filter_map(|(name, value)| {
            let (batch, pos) = name.strip_prefix(KEY_PARAM_PREFIX)?.split_once('_')?;
            Some(((batch.parse().ok()?, pos.parse().ok()?), value))
        })
        .collect();
    keyed.sort_by_key(|(order, _)| *order);
    keyed.into_iter().map(|(_, v)| v.clone()).collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
