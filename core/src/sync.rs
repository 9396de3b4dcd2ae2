// SPDX-License-Identifier: PMPL-1.0-or-later
//! Batched, streaming row synchronization with per-row upsert semantics.

use tokio_postgres::types::ToSql;
use tracing::{info, instrument, warn};

use crate::connection::PgHandle;
use crate::error::{ForeignKeyProbeError, SyncError, SyncOp};
use crate::model::Table;
use crate::value::RawValue;

/// Default batch size (§6); implementers may override via [`crate::config`].
pub const DEFAULT_BATCH_SIZE: i64 = 1000;

/// Outcome of synchronizing one table, used for the run summary.
#[derive(Debug, Clone)]
pub struct TableSyncReport {
    pub table: String,
    pub rows_processed: i64,
}

/// Stream `table`'s rows from `source` in batches of `batch_size` and
/// upsert each into `destination`, resolving foreign keys against the
/// destination's current contents as it goes.
#[instrument(skip(source, destination, table), fields(table = %table.qualified_name()))]
pub async fn sync_table(
    source: &PgHandle,
    destination: &mut PgHandle,
    table: &Table,
    batch_size: i64,
) -> Result<TableSyncReport, SyncError> {
    let qualified = table.qualified_name();
    let column_list = table
        .columns
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let count_query = format!("SELECT COUNT(*) FROM {}", qualified);
    let total_rows: i64 = source
        .client()
        .query_one(&count_query, &[])
        .await
        .map_err(|e| sync_err(&qualified, SyncOp::Count, 0, None, e))?
        .get(0);

    let insert_query = build_insert_query(table);
    let update_query = build_update_query(table);
    let exists_query = build_exists_query(table);

    let mut rows_processed: i64 = 0;
    let mut offset: i64 = 0;

    while offset < total_rows {
        let select_query = format!(
            "SELECT {} FROM {} LIMIT {} OFFSET {}",
            column_list, qualified, batch_size, offset
        );
        let rows = source
            .client()
            .query(&select_query, &[])
            .await
            .map_err(|e| sync_err(&qualified, SyncOp::Select, offset, None, e))?;

        let tx = destination
            .client_mut()
            .transaction()
            .await
            .map_err(|e| sync_err(&qualified, SyncOp::Prepare, offset, None, e))?;

        let insert_stmt = tx
            .prepare(&insert_query)
            .await
            .map_err(|e| sync_err(&qualified, SyncOp::Prepare, offset, None, e))?;
        let update_stmt = tx
            .prepare(&update_query)
            .await
            .map_err(|e| sync_err(&qualified, SyncOp::Prepare, offset, None, e))?;
        let exists_stmt = tx
            .prepare(&exists_query)
            .await
            .map_err(|e| sync_err(&qualified, SyncOp::Prepare, offset, None, e))?;

        let mut fk_probes = Vec::with_capacity(table.constraints.len());
        for fk in &table.constraints {
            let local_idx = table
                .columns
                .iter()
                .position(|c| c.name == fk.local_column)
                .expect("foreign key local_column resolves to a column of its own table");
            let probe_query = format!(
                "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = $1)",
                fk.referenced_table, fk.referenced_column
            );
            let stmt = tx
                .prepare(&probe_query)
                .await
                .map_err(|e| sync_err(&qualified, SyncOp::Prepare, offset, None, e))?;
            fk_probes.push((local_idx, fk.local_column.clone(), fk.referenced_table.clone(), stmt));
        }

        for (row_index, row) in rows.iter().enumerate() {
            let mut values: Vec<RawValue> = Vec::with_capacity(table.columns.len());
            for i in 0..table.columns.len() {
                let v: RawValue = row
                    .try_get(i)
                    .map_err(|e| sync_err(&qualified, SyncOp::Scan, offset, Some(row_index), e))?;
                values.push(v);
            }

            for (local_idx, local_column, referenced_table, stmt) in &fk_probes {
                if values[*local_idx].is_null() {
                    continue;
                }
                let params: [&(dyn ToSql + Sync); 1] = [&values[*local_idx]];
                let referenced_exists = match tx.query_one(stmt, &params).await {
                    Ok(exists_row) => exists_row.get(0),
                    Err(source) => {
                        let probe_err = ForeignKeyProbeError {
                            table: qualified.clone(),
                            column: local_column.clone(),
                            referenced_table: referenced_table.clone(),
                            source,
                        };
                        warn!(error = %probe_err, "foreign key probe failed, treating reference as absent");
                        false
                    }
                };
                if !referenced_exists {
                    values[*local_idx] = values[*local_idx].null_of();
                }
            }

            let pk_values: Vec<&RawValue> = table
                .columns
                .iter()
                .zip(values.iter())
                .filter(|(c, _)| c.is_primary_key)
                .map(|(_, v)| v)
                .collect();
            let pk_params: Vec<&(dyn ToSql + Sync)> = pk_values
                .iter()
                .map(|v| *v as &(dyn ToSql + Sync))
                .collect();

            let exists_row = tx
                .query_one(&exists_stmt, &pk_params)
                .await
                .map_err(|e| sync_err(&qualified, SyncOp::Exists, offset, Some(row_index), e))?;
            let row_exists: bool = exists_row.get(0);

            if row_exists {
                let mut update_params: Vec<&(dyn ToSql + Sync)> =
                    values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
                update_params.extend(pk_params.iter().copied());
                tx.execute(&update_stmt, &update_params).await.map_err(|e| {
                    sync_err(&qualified, SyncOp::Update, offset, Some(row_index), e)
                })?;
            } else {
                let insert_params: Vec<&(dyn ToSql + Sync)> =
                    values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
                tx.execute(&insert_stmt, &insert_params).await.map_err(|e| {
                    sync_err(&qualified, SyncOp::Insert, offset, Some(row_index), e)
                })?;
            }

            rows_processed += 1;
        }

        tx.commit()
            .await
            .map_err(|e| sync_err(&qualified, SyncOp::Commit, offset, None, e))?;

        info!(
            table = %qualified,
            offset,
            batch_rows = rows.len(),
            total_rows,
            "batch committed"
        );

        offset += batch_size;
    }

    info!(table = %qualified, rows_processed, "table sync complete");

    Ok(TableSyncReport {
        table: qualified,
        rows_processed,
    })
}

fn build_insert_query(table: &Table) -> String {
    let placeholders = (1..=table.columns.len())
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {} VALUES ({})", table.qualified_name(), placeholders)
}

fn build_update_query(table: &Table) -> String {
    let set_clause = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}=${}", c.name, i + 1))
        .collect::<Vec<_>>()
        .join(", ");

    let k = table.columns.len();
    let where_clause = table
        .columns
        .iter()
        .filter(|c| c.is_primary_key)
        .enumerate()
        .map(|(j, c)| format!("{}=${}", c.name, k + 1 + j))
        .collect::<Vec<_>>()
        .join(" AND ");

    format!(
        "UPDATE {} SET {} WHERE {}",
        table.qualified_name(),
        set_clause,
        where_clause
    )
}

fn build_exists_query(table: &Table) -> String {
    let where_clause = table
        .columns
        .iter()
        .filter(|c| c.is_primary_key)
        .enumerate()
        .map(|(j, c)| format!("{}=${}", c.name, j + 1))
        .collect::<Vec<_>>()
        .join(" AND ");

    format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE {})",
        table.qualified_name(),
        where_clause
    )
}

fn sync_err(
    table: &str,
    operation: SyncOp,
    offset: i64,
    row_index: Option<usize>,
    source: tokio_postgres::Error,
) -> SyncError {
    SyncError {
        table: table.to_string(),
        operation,
        offset,
        row_index,
        source,
    }
}
