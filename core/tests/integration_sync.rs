// SPDX-License-Identifier: PMPL-1.0-or-later
//! End-to-end tests against live, disposable PostgreSQL databases.
//!
//! Skipped unless `PGSYNC_TEST_SOURCE_URL` and `PGSYNC_TEST_DEST_URL` are
//! both set. Each test is responsible for creating and dropping its own
//! tables so runs do not interfere with each other.

use pgsync_core::{introspect, plan, sync_table, PgHandle};

fn test_urls() -> Option<(String, String)> {
    let source = std::env::var("PGSYNC_TEST_SOURCE_URL").ok()?;
    let dest = std::env::var("PGSYNC_TEST_DEST_URL").ok()?;
    Some((source, dest))
}

macro_rules! require_test_databases {
    () => {
        match test_urls() {
            Some(urls) => urls,
            None => {
                eprintln!(
                    "skipping: set PGSYNC_TEST_SOURCE_URL and PGSYNC_TEST_DEST_URL to run this test"
                );
                return;
            }
        }
    };
}

#[tokio::test]
async fn sync_inserts_then_reconciles_on_rerun() {
    let (source_url, dest_url) = require_test_databases!();

    let source = PgHandle::connect(&source_url).await.expect("connect source");
    let mut destination = PgHandle::connect(&dest_url).await.expect("connect destination");

    source
        .client()
        .batch_execute(
            "DROP TABLE IF EXISTS widgets;
             CREATE TABLE widgets (id integer PRIMARY KEY, label text);
             INSERT INTO widgets VALUES (1, 'a'), (2, 'b');",
        )
        .await
        .expect("seed source");

    destination
        .client_mut()
        .batch_execute(
            "DROP TABLE IF EXISTS widgets;
             CREATE TABLE widgets (id integer PRIMARY KEY, label text);",
        )
        .await
        .expect("seed destination schema");

    let model = introspect(&source).await.expect("introspect");
    let tables = vec!["public.widgets".to_string()];
    let execution_plan = plan(&model, &tables).expect("plan");
    let table = execution_plan.tables()[0];

    let first = sync_table(&source, &mut destination, table, 1000)
        .await
        .expect("first sync");
    assert_eq!(first.rows_processed, 2);

    source
        .client()
        .execute("UPDATE widgets SET label = 'changed' WHERE id = 1", &[])
        .await
        .expect("mutate source row");

    let second = sync_table(&source, &mut destination, table, 1000)
        .await
        .expect("second sync is idempotent");
    assert_eq!(second.rows_processed, 2);

    let row = destination
        .client()
        .query_one("SELECT label FROM widgets WHERE id = 1", &[])
        .await
        .expect("read back updated row");
    let label: String = row.get(0);
    assert_eq!(label, "changed");
}

#[tokio::test]
async fn batch_boundaries_do_not_change_row_count() {
    let (source_url, dest_url) = require_test_databases!();

    let source = PgHandle::connect(&source_url).await.expect("connect source");
    let mut destination = PgHandle::connect(&dest_url).await.expect("connect destination");

    source
        .client()
        .batch_execute(
            "DROP TABLE IF EXISTS gadgets;
             CREATE TABLE gadgets (id integer PRIMARY KEY);",
        )
        .await
        .expect("seed source schema");

    for i in 0..25 {
        source
            .client()
            .execute("INSERT INTO gadgets VALUES ($1)", &[&i])
            .await
            .expect("seed row");
    }

    destination
        .client_mut()
        .batch_execute(
            "DROP TABLE IF EXISTS gadgets;
             CREATE TABLE gadgets (id integer PRIMARY KEY);",
        )
        .await
        .expect("seed destination schema");

    let model = introspect(&source).await.expect("introspect");
    let tables = vec!["public.gadgets".to_string()];
    let execution_plan = plan(&model, &tables).expect("plan");
    let table = execution_plan.tables()[0];

    let report = sync_table(&source, &mut destination, table, 7)
        .await
        .expect("sync with a batch size that does not evenly divide row count");

    assert_eq!(report.rows_processed, 25);
}

#[tokio::test]
async fn optional_foreign_key_to_missing_row_is_synced_as_null() {
    let (source_url, dest_url) = require_test_databases!();

    let source = PgHandle::connect(&source_url).await.expect("connect source");
    let mut destination = PgHandle::connect(&dest_url).await.expect("connect destination");

    source
        .client()
        .batch_execute(
            "DROP TABLE IF EXISTS line_items, orders CASCADE;
             CREATE TABLE orders (id integer PRIMARY KEY);
             CREATE TABLE line_items (
                 id integer PRIMARY KEY,
                 order_id integer,
                 CONSTRAINT fk_line_items_order FOREIGN KEY (order_id) REFERENCES orders (id)
             );
             INSERT INTO line_items VALUES (1, 999);",
        )
        .await
        .expect("seed source: line_items references an order that will never exist anywhere");

    destination
        .client_mut()
        .batch_execute(
            "DROP TABLE IF EXISTS line_items, orders CASCADE;
             CREATE TABLE orders (id integer PRIMARY KEY);
             CREATE TABLE line_items (
                 id integer PRIMARY KEY,
                 order_id integer,
                 CONSTRAINT fk_line_items_order FOREIGN KEY (order_id) REFERENCES orders (id)
             );",
        )
        .await
        .expect("seed destination schema");

    let model = introspect(&source).await.expect("introspect");
    let tables = vec!["public.line_items".to_string()];
    let execution_plan = plan(&model, &tables).expect("plan");
    let table = execution_plan.tables()[0];

    sync_table(&source, &mut destination, table, 1000)
        .await
        .expect("sync substitutes NULL instead of violating the FK");

    let row = destination
        .client()
        .query_one("SELECT order_id FROM line_items WHERE id = 1", &[])
        .await
        .expect("read back row");
    let order_id: Option<i32> = row.get(0);
    assert_eq!(order_id, None);
}
