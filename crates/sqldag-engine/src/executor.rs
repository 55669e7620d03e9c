//! Query execution seam
//!
//! The engine never talks to a driver directly. Jobs run against a
//! [`QueryExecutor`]; batched jobs open a [`QuerySession`] so that every batch
//! of one job runs inside the same transaction on one connection.

use crate::error::Result;
use crate::table::{Params, ResultSet};
use async_trait::async_trait;

/// Trait for running job queries (dependency injection)
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run one query with named parameters and return every row
    async fn fetch(&self, sql: &str, params: &Params) -> Result<ResultSet>;

    /// Open a transactional session for a sequence of queries.
    ///
    /// Dropping the session without calling [`QuerySession::commit`] must
    /// release the connection and roll back.
    async fn begin(&self) -> Result<Box<dyn QuerySession + '_>>;
}

/// A scoped sequence of queries on one connection
#[async_trait]
pub trait QuerySession: Send {
    async fn fetch(&mut self, sql: &str, params: &Params) -> Result<ResultSet>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
