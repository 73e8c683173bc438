//! Read-only adapter over an ODBC-style execution service.
//!
//! The adapter owns no connection. It resolves collections to tables,
//! compiles criteria, hands finished SQL to an [`Executor`] and normalizes
//! the rows that come back.

use std::future::Future;

use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::criteria::Criteria;
use crate::error::PervasiveResult;
use crate::schema::{Collection, Registry};
use crate::transpiler::build_select;

/// A result row: column name → JSON value, in column order.
pub type Row = IndexMap<String, Json>;

/// Anything that can run a finished SQL string.
pub trait Executor: Send + Sync {
    /// Execute `sql` and return its rows.
    fn execute(&self, sql: &str) -> impl Future<Output = PervasiveResult<Vec<Row>>> + Send;
}

/// Trim trailing whitespace from every string column (fixed-width CHAR
/// columns come back space padded).
pub fn normalize_rows(mut rows: Vec<Row>) -> Vec<Row> {
    for row in &mut rows {
        for value in row.values_mut() {
            if let Json::String(s) = value {
                let trimmed = s.trim_end().len();
                s.truncate(trimmed);
            }
        }
    }
    rows
}

/// Read-only adapter: `find` and raw `query`.
pub struct Adapter<E> {
    executor: E,
    registry: Registry,
}

impl<E: Executor> Adapter<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            registry: Registry::new(),
        }
    }

    pub fn with_registry(executor: E, registry: Registry) -> Self {
        Self { executor, registry }
    }

    /// Register a collection definition. The first definition of an
    /// identity is kept.
    pub fn register(&mut self, collection: Collection) {
        tracing::debug!(
            identity = %collection.identity,
            table = collection.table(),
            primary_key = collection.primary_key(),
            "registering collection"
        );
        self.registry.register(collection);
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Find rows in a collection.
    ///
    /// Usage errors are raised before anything reaches the executor.
    pub async fn find(&self, identity: &str, criteria: &Criteria) -> PervasiveResult<Vec<Row>> {
        let table = self.registry.get(identity)?.table();
        let sql = build_select(table, criteria)?;
        self.query(&sql).await
    }

    /// Run raw SQL.
    pub async fn query(&self, sql: &str) -> PervasiveResult<Vec<Row>> {
        tracing::debug!(sql, "executing");
        let rows = self.executor.execute(sql).await?;
        Ok(normalize_rows(rows))
    }
}
