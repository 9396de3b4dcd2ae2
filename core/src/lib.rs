// SPDX-License-Identifier: PMPL-1.0-or-later
//! Schema-aware, dependency-ordered PostgreSQL table synchronizer.
//!
//! The four stages run in sequence for each invocation:
//! [`connection::PgHandle::connect`] to both databases, [`introspect::introspect`]
//! the source catalog, [`plan::plan`] a safe execution order for the
//! requested tables, then [`sync::sync_table`] each table in that order.

pub mod connection;
pub mod error;
pub mod introspect;
pub mod model;
pub mod plan;
pub mod sync;
pub mod value;

pub use connection::PgHandle;
pub use error::{ConnectionError, IntrospectionError, PlanError, SyncError, SyncOp, SyncRunError};
pub use introspect::introspect;
pub use model::{Action, Column, DatabaseModel, ForeignKey, Table};
pub use plan::{plan, ExecutionPlan};
pub use sync::{sync_table, TableSyncReport, DEFAULT_BATCH_SIZE};

/// Summary of a complete run: every table synchronized, in plan order.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub reports: Vec<TableSyncReport>,
}

impl RunSummary {
    pub fn total_rows(&self) -> i64 {
        self.reports.iter().map(|r| r.rows_processed).sum()
    }
}

/// Run a full synchronization: connect to both databases, introspect the
/// source, plan the requested tables, and sync each in order.
#[tracing::instrument(skip(source_dsn, destination_dsn, tables))]
pub async fn run(
    source_dsn: &str,
    destination_dsn: &str,
    tables: &[String],
    batch_size: i64,
) -> Result<RunSummary, SyncRunError> {
    let source = PgHandle::connect(source_dsn).await?;
    let mut destination = PgHandle::connect(destination_dsn).await?;

    let model = introspect(&source).await?;
    let execution_plan = plan(&model, tables)?;

    let mut reports = Vec::with_capacity(execution_plan.len());
    for table in execution_plan.tables() {
        let report = sync_table(&source, &mut destination, table, batch_size).await?;
        reports.push(report);
    }

    Ok(RunSummary { reports })
}
