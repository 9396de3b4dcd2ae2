// SPDX-License-Identifier: PMPL-1.0-or-later
//! Dependency planning: turn a requested table subset into a safe
//! execution order.

use std::collections::{HashSet, VecDeque};

use tracing::{instrument, warn};

use crate::error::PlanError;
use crate::model::{DatabaseModel, Table};

/// An ordered sequence of tables to synchronize, one table at a time, in
/// the order returned.
///
/// For every table `T` at position `i`, every foreign key of `T` whose
/// referenced table is also in the plan refers to a table at some
/// position `< i`, or its local column is nullable.
#[derive(Debug)]
pub struct ExecutionPlan<'a> {
    tables: Vec<&'a Table>,
}

impl<'a> ExecutionPlan<'a> {
    pub fn tables(&self) -> &[&'a Table] {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Resolve `requested_names` against `model` and derive a safe execution
/// order.
///
/// Names absent from the model are skipped with a logged warning, not an
/// error (see design notes on config-name filter precision).
#[instrument(skip(model, requested_names))]
pub fn plan<'a>(
    model: &'a DatabaseModel,
    requested_names: &[String],
) -> Result<ExecutionPlan<'a>, PlanError> {
    let mut resolved: Vec<&'a Table> = Vec::new();
    let mut resolved_names: HashSet<String> = HashSet::new();

    for name in requested_names {
        match model.get(name) {
            Some(table) => {
                resolved_names.insert(table.qualified_name());
                resolved.push(table);
            }
            None => {
                warn!(table = %name, "requested table not found in source catalog, skipping");
            }
        }
    }

    for table in &resolved {
        if !table.has_primary_key() {
            return Err(PlanError::UnsatisfiableUpsert {
                table: table.qualified_name(),
            });
        }
    }

    for table in &resolved {
        for fk in &table.constraints {
            let local_nullable = table
                .column(&fk.local_column)
                .map(|c| c.is_nullable)
                .unwrap_or(true);
            if !local_nullable && !resolved_names.contains(&fk.referenced_table) {
                return Err(PlanError::UnsatisfiableDependency {
                    table: table.qualified_name(),
                    column: fk.local_column.clone(),
                    referenced_table: fk.referenced_table.clone(),
                });
            }
        }
    }

    let mut queue: VecDeque<&'a Table> = resolved.into_iter().collect();
    let mut emitted: HashSet<String> = HashSet::new();
    let mut ordered: Vec<&'a Table> = Vec::new();

    while !queue.is_empty() {
        let pass_len = queue.len();
        let mut made_progress = false;

        for _ in 0..pass_len {
            let table = queue.pop_front().expect("pass_len bounds the loop");
            if is_ready(table, &emitted) {
                emitted.insert(table.qualified_name());
                ordered.push(table);
                made_progress = true;
            } else {
                queue.push_back(table);
            }
        }

        if !made_progress {
            let stuck = queue.front().expect("queue is non-empty here");
            return Err(PlanError::CyclicDependency {
                table: stuck.qualified_name(),
            });
        }
    }

    Ok(ExecutionPlan { tables: ordered })
}

fn is_ready(table: &Table, emitted: &HashSet<String>) -> bool {
    table.constraints.iter().all(|fk| {
        let local_nullable = table
            .column(&fk.local_column)
            .map(|c| c.is_nullable)
            .unwrap_or(true);
        local_nullable || emitted.contains(&fk.referenced_table)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, Column, ForeignKey};

    fn pk_column(name: &str) -> Column {
        Column {
            name: name.to_string(),
            data_type: "integer".to_string(),
            length_precision: 0,
            is_primary_key: true,
            is_nullable: false,
        }
    }

    fn plain_column(name: &str, nullable: bool) -> Column {
        Column {
            name: name.to_string(),
            data_type: "integer".to_string(),
            length_precision: 0,
            is_primary_key: false,
            is_nullable: nullable,
        }
    }

    fn fk(name: &str, local_column: &str, referenced_table: &str, referenced_column: &str) -> ForeignKey {
        ForeignKey {
            name: name.to_string(),
            local_column: local_column.to_string(),
            referenced_column: referenced_column.to_string(),
            referenced_table: referenced_table.to_string(),
            on_update: Action::NoAction,
            on_delete: Action::NoAction,
        }
    }

    fn table(schema: &str, name: &str, columns: Vec<Column>, constraints: Vec<ForeignKey>) -> Table {
        Table {
            schema: schema.to_string(),
            name: name.to_string(),
            columns,
            constraints,
        }
    }

    #[test]
    fn independent_tables_all_appear_in_any_order() {
        let mut model = DatabaseModel::new();
        model.insert(table("public", "a", vec![pk_column("id")], vec![]));
        model.insert(table("public", "b", vec![pk_column("id")], vec![]));

        let names = vec!["public.a".to_string(), "public.b".to_string()];
        let result = plan(&model, &names).expect("both tables are independent and satisfiable");

        assert_eq!(result.len(), 2);
    }

    #[test]
    fn dependent_table_is_ordered_after_its_dependency() {
        let mut model = DatabaseModel::new();
        model.insert(table("public", "parent", vec![pk_column("id")], vec![]));
        model.insert(table(
            "public",
            "child",
            vec![pk_column("id"), plain_column("parent_id", false)],
            vec![fk("fk_child_parent", "parent_id", "public.parent", "id")],
        ));

        let names = vec!["public.child".to_string(), "public.parent".to_string()];
        let result = plan(&model, &names).expect("dependency is satisfiable");

        let positions: Vec<&str> = result.tables().iter().map(|t| t.name.as_str()).collect();
        let parent_pos = positions.iter().position(|&n| n == "parent").unwrap();
        let child_pos = positions.iter().position(|&n| n == "child").unwrap();
        assert!(parent_pos < child_pos);
    }

    #[test]
    fn nullable_self_reference_does_not_block_planning() {
        let mut model = DatabaseModel::new();
        model.insert(table(
            "public",
            "node",
            vec![pk_column("id"), plain_column("parent_id", true)],
            vec![fk("fk_node_parent", "parent_id", "public.node", "id")],
        ));

        let names = vec!["public.node".to_string()];
        let result = plan(&model, &names).expect("nullable self-reference is satisfiable");

        assert_eq!(result.len(), 1);
    }

    #[test]
    fn missing_primary_key_is_rejected() {
        let mut model = DatabaseModel::new();
        model.insert(table(
            "public",
            "no_pk",
            vec![plain_column("value", true)],
            vec![],
        ));

        let names = vec!["public.no_pk".to_string()];
        let err = plan(&model, &names).unwrap_err();

        assert!(matches!(err, PlanError::UnsatisfiableUpsert { .. }));
    }

    #[test]
    fn mandatory_dependency_outside_requested_set_is_rejected() {
        let mut model = DatabaseModel::new();
        model.insert(table("public", "parent", vec![pk_column("id")], vec![]));
        model.insert(table(
            "public",
            "child",
            vec![pk_column("id"), plain_column("parent_id", false)],
            vec![fk("fk_child_parent", "parent_id", "public.parent", "id")],
        ));

        let names = vec!["public.child".to_string()];
        let err = plan(&model, &names).unwrap_err();

        assert!(matches!(err, PlanError::UnsatisfiableDependency { .. }));
    }

    #[test]
    fn unsatisfiable_two_table_cycle_is_rejected() {
        let mut model = DatabaseModel::new();
        model.insert(table(
            "public",
            "a",
            vec![pk_column("id"), plain_column("b_id", false)],
            vec![fk("fk_a_b", "b_id", "public.b", "id")],
        ));
        model.insert(table(
            "public",
            "b",
            vec![pk_column("id"), plain_column("a_id", false)],
            vec![fk("fk_b_a", "a_id", "public.a", "id")],
        ));

        let names = vec!["public.a".to_string(), "public.b".to_string()];
        let err = plan(&model, &names).unwrap_err();

        assert!(matches!(err, PlanError::CyclicDependency { .. }));
    }

    #[test]
    fn unknown_requested_table_is_skipped_not_errored() {
        let mut model = DatabaseModel::new();
        model.insert(table("public", "a", vec![pk_column("id")], vec![]));

        let names = vec!["public.a".to_string(), "public.does_not_exist".to_string()];
        let result = plan(&model, &names).expect("unknown names are skipped, not fatal");

        assert_eq!(result.len(), 1);
    }
}
