// SPDX-License-Identifier: PMPL-1.0-or-later
//! In-memory representation of a PostgreSQL schema subset.
//!
//! A [`DatabaseModel`] is built once per run by the introspector and is
//! read-only for the rest of the run: the planner and synchronizer both
//! borrow from it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A fully-qualified table name, `schema.name`.
pub fn qualified_name(schema: &str, name: &str) -> String {
    format!("{}.{}", schema, name)
}

/// A column definition as seen in `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Catalog type name, informational only.
    pub data_type: String,
    /// 0 means unspecified (not a `character`-family type).
    pub length_precision: i32,
    pub is_primary_key: bool,
    pub is_nullable: bool,
}

/// Referential action as declared on a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    NoAction,
    Cascade,
    SetNull,
    Restrict,
}

impl Action {
    pub fn from_catalog_str(s: &str) -> Self {
        match s {
            "CASCADE" => Action::Cascade,
            "SET NULL" => Action::SetNull,
            "RESTRICT" => Action::Restrict,
            _ => Action::NoAction,
        }
    }
}

/// A foreign key constraint originating from a table.
///
/// Only constraints named `fk_*` are visible to the planner; this is an
/// external contract on source schemas, not a filter applied here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: String,
    pub local_column: String,
    pub referenced_column: String,
    /// Fully-qualified `schema.name` of the referenced table.
    pub referenced_table: String,
    pub on_update: Action,
    pub on_delete: Action,
}

/// A table, its columns in catalog (`ordinal_position`) order, and the
/// foreign keys it declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub schema: String,
    pub name: String,
    pub columns: Vec<Column>,
    pub constraints: Vec<ForeignKey>,
}

impl Table {
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.schema, &self.name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.is_primary_key).collect()
    }

    pub fn has_primary_key(&self) -> bool {
        self.columns.iter().any(|c| c.is_primary_key)
    }
}

/// The full introspected model of a source database: every table the
/// catalog knows about, keyed by `schema.name`.
///
/// Built once per run, read-only thereafter. System schemas are not
/// filtered out here (see introspection notes); the planner filters by
/// the requested subset.
#[derive(Debug, Clone, Default)]
pub struct DatabaseModel {
    tables: HashMap<String, Table>,
}

impl DatabaseModel {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.qualified_name(), table);
    }

    pub fn get(&self, qualified_name: &str) -> Option<&Table> {
        self.tables.get(qualified_name)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }
}
