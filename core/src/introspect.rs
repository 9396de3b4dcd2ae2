// SPDX-License-Identifier: PMPL-1.0-or-later
//! Catalog introspection: build a [`DatabaseModel`] from a live source's
//! `information_schema`.

use std::collections::HashSet;

use tracing::{info, instrument};

use crate::connection::PgHandle;
use crate::error::IntrospectionError;
use crate::model::{Action, Column, DatabaseModel, ForeignKey, Table};

/// Build a full model of the source catalog.
///
/// `information_schema.tables` is not filtered by schema here — system
/// schemas are harmless because the planner only ever looks at the
/// requested subset. Implementers with a performance-sensitive catalog
/// may pre-filter `pg_catalog`/`information_schema` themselves without
/// changing observable behavior.
#[instrument(skip(source))]
pub async fn introspect(source: &PgHandle) -> Result<DatabaseModel, IntrospectionError> {
    let client = source.client();
    let mut model = DatabaseModel::new();

    let table_rows = client
        .query(
            "SELECT table_schema, table_name FROM information_schema.tables",
            &[],
        )
        .await?;

    for row in &table_rows {
        let schema: String = row.get(0);
        let name: String = row.get(1);

        let columns = introspect_columns(source, &schema, &name).await?;
        let constraints = introspect_foreign_keys(source, &schema, &name).await?;

        model.insert(Table {
            schema,
            name,
            columns,
            constraints,
        });
    }

    info!(tables = model.len(), "introspection complete");
    Ok(model)
}

async fn introspect_columns(
    source: &PgHandle,
    schema: &str,
    table: &str,
) -> Result<Vec<Column>, IntrospectionError> {
    let client = source.client();

    let column_rows = client
        .query(
            r#"
            SELECT column_name, data_type, character_maximum_length, is_nullable
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
            "#,
            &[&schema, &table],
        )
        .await?;

    let pk_rows = client
        .query(
            r#"
            SELECT kcu.column_name
            FROM information_schema.key_column_usage kcu
            WHERE kcu.table_schema = $1
              AND kcu.table_name = $2
              AND kcu.constraint_name LIKE '%pkey'
            "#,
            &[&schema, &table],
        )
        .await?;
    let pk_columns: HashSet<String> = pk_rows.iter().map(|r| r.get(0)).collect();

    let mut columns = Vec::with_capacity(column_rows.len());
    for row in &column_rows {
        let name: String = row.get(0);
        let data_type: String = row.get(1);
        let length_precision: Option<i32> = row.get(2);
        let is_nullable_str: String = row.get(3);

        columns.push(Column {
            is_primary_key: pk_columns.contains(&name),
            name,
            data_type,
            length_precision: length_precision.unwrap_or(0),
            is_nullable: is_nullable_str == "YES",
        });
    }

    Ok(columns)
}

async fn introspect_foreign_keys(
    source: &PgHandle,
    schema: &str,
    table: &str,
) -> Result<Vec<ForeignKey>, IntrospectionError> {
    let client = source.client();

    let rows = client
        .query(
            r#"
            SELECT
                kcu.constraint_name,
                kcu.column_name AS local_column,
                ccu.column_name AS referenced_column,
                ccu.table_schema || '.' || ccu.table_name AS referenced_table,
                rc.update_rule,
                rc.delete_rule
            FROM information_schema.key_column_usage kcu
            JOIN information_schema.referential_constraints rc
                ON kcu.constraint_name = rc.constraint_name
                AND kcu.constraint_schema = rc.constraint_schema
            JOIN information_schema.constraint_column_usage ccu
                ON rc.unique_constraint_name = ccu.constraint_name
                AND rc.unique_constraint_schema = ccu.constraint_schema
            WHERE kcu.table_schema = $1
              AND kcu.table_name = $2
              AND kcu.constraint_name LIKE 'fk\_%' ESCAPE '\'
            "#,
            &[&schema, &table],
        )
        .await?;

    let mut constraints = Vec::with_capacity(rows.len());
    for row in &rows {
        let name: String = row.get(0);
        let local_column: String = row.get(1);
        let referenced_column: String = row.get(2);
        let referenced_table: String = row.get(3);
        let update_rule: String = row.get(4);
        let delete_rule: String = row.get(5);

        constraints.push(ForeignKey {
            name,
            local_column,
            referenced_column,
            referenced_table,
            on_update: Action::from_catalog_str(&update_rule),
            on_delete: Action::from_catalog_str(&delete_rule),
        });
    }

    Ok(constraints)
}
