// SPDX-License-Identifier: PMPL-1.0-or-later
//! Error taxonomy for the synchronizer core.
//!
//! Each stage (connect, introspect, plan, sync) has its own error type so
//! callers can match on provenance; [`SyncRunError`] composes them into a
//! single `?`-friendly type for orchestration code.

use thiserror::Error;

/// Failure establishing a connection to a source or destination database.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("failed to connect: {0}")]
    Failed(#[from] tokio_postgres::Error),
}

/// Failure while building a [`crate::model::DatabaseModel`] from the source catalog.
#[derive(Error, Debug)]
pub enum IntrospectionError {
    #[error("catalog query failed: {0}")]
    QueryFailed(#[from] tokio_postgres::Error),
}

/// Failure while deriving an [`crate::plan::ExecutionPlan`] from a model and a
/// requested table subset.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("table {table} has no primary key; upsert is not possible")]
    UnsatisfiableUpsert { table: String },

    #[error(
        "table {table} column {column} is a mandatory foreign key to {referenced_table}, \
         which is not in the requested table set"
    )]
    UnsatisfiableDependency {
        table: String,
        column: String,
        referenced_table: String,
    },

    #[error("cyclic dependency detected involving table {table}")]
    CyclicDependency { table: String },
}

/// The SQL operation that was in flight when a [`SyncError`] occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOp {
    Count,
    Select,
    Prepare,
    Scan,
    Exists,
    Insert,
    Update,
    Commit,
}

impl std::fmt::Display for SyncOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncOp::Count => "count",
            SyncOp::Select => "select",
            SyncOp::Prepare => "prepare",
            SyncOp::Scan => "scan",
            SyncOp::Exists => "exists",
            SyncOp::Insert => "insert",
            SyncOp::Update => "update",
            SyncOp::Commit => "commit",
        };
        f.write_str(s)
    }
}

/// Failure while streaming and upserting rows for one table.
#[derive(Error, Debug)]
#[error("sync failed on table {table} during {operation} at offset {offset} (row {row_index:?}): {source}")]
pub struct SyncError {
    pub table: String,
    pub operation: SyncOp,
    pub offset: i64,
    pub row_index: Option<usize>,
    #[source]
    pub source: tokio_postgres::Error,
}

/// A foreign key existence probe could not be run. Permissive by design:
/// the synchronizer logs this and treats the reference as absent (nulling
/// the column) rather than aborting the table, matching `checkFKExists`
/// in the original implementation this is ported from.
#[derive(Error, Debug)]
#[error(
    "foreign key probe failed on table {table} column {column} referencing {referenced_table}: {source}"
)]
pub struct ForeignKeyProbeError {
    pub table: String,
    pub column: String,
    pub referenced_table: String,
    #[source]
    pub source: tokio_postgres::Error,
}

/// Top-level error for one synchronizer invocation; every stage's error
/// bubbles up through this.
#[derive(Error, Debug)]
pub enum SyncRunError {
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("introspection error: {0}")]
    Introspection(#[from] IntrospectionError),

    #[error("planning error: {0}")]
    Plan(#[from] PlanError),

    #[error("sync error: {0}")]
    Sync(#[from] SyncError),
}
