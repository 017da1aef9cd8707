//! Schema differ: computes the minimal additive change-set between two
//! schema snapshots.

use tracing::debug;

use crate::core::schema::{ChangeSet, SchemaSnapshot};

/// Compare two schema snapshots and compute the additive change-set that
/// converges the target toward the source.
///
/// Tables present only on the source become full-definition creates. For
/// tables present on both sides, source columns are walked in ordinal order:
/// a column absent on the target is appended to `columns_to_add`, and a
/// column whose type tag differs is appended to `columns_to_widen` carrying
/// the source's type. No directionality check is performed on type changes;
/// the target engine accepts or rejects the resulting ALTER. Tables and
/// columns present only on the target are never touched.
pub fn diff_schemas(source: &SchemaSnapshot, target: &SchemaSnapshot) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for (name, source_table) in source {
        let Some(target_table) = target.get(name) else {
            debug!(table = %name, "table missing on target, scheduling create");
            changes.tables_to_create.push(source_table.clone());
            continue;
        };

        for source_col in &source_table.columns {
            match target_table.column(&source_col.name) {
                None => {
                    debug!(
                        table = %name,
                        column = %source_col.name,
                        "column missing on target, scheduling add"
                    );
                    changes
                        .columns_to_add
                        .entry(name.clone())
                        .or_default()
                        .push(source_col.clone());
                }
                Some(target_col) if target_col.type_tag != source_col.type_tag => {
                    debug!(
                        table = %name,
                        column = %source_col.name,
                        target_type = %target_col.type_tag,
                        source_type = %source_col.type_tag,
                        "column type differs, scheduling type change"
                    );
                    changes
                        .columns_to_widen
                        .entry(name.clone())
                        .or_default()
                        .push(source_col.clone());
                }
                Some(_) => {}
            }
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ColumnDef, TableSchema};

    fn snapshot(tables: Vec<TableSchema>) -> SchemaSnapshot {
        tables.into_iter().map(|t| (t.name.clone(), t)).collect()
    }

    fn users() -> TableSchema {
        TableSchema::new(
            "users",
            vec![
                ColumnDef::new("id", "integer"),
                ColumnDef::new("name", "character varying"),
            ],
        )
    }

    fn orders() -> TableSchema {
        TableSchema::new(
            "orders",
            vec![
                ColumnDef::new("id", "integer"),
                ColumnDef::new("amount", "integer"),
            ],
        )
    }

    #[test]
    fn missing_table_becomes_full_definition_create() {
        // Scenario: source has {orders, users}, target has {users}.
        let source = snapshot(vec![orders(), users()]);
        let target = snapshot(vec![users()]);

        let changes = diff_schemas(&source, &target);

        assert_eq!(changes.tables_to_create, vec![orders()]);
        assert!(changes.columns_to_add.is_empty());
        assert!(changes.columns_to_widen.is_empty());
    }

    #[test]
    fn missing_column_is_added_with_source_type() {
        let source = snapshot(vec![TableSchema::new(
            "users",
            vec![
                ColumnDef::new("id", "integer"),
                ColumnDef::new("name", "character varying"),
                ColumnDef::new("active", "boolean"),
            ],
        )]);
        let target = snapshot(vec![users()]);

        let changes = diff_schemas(&source, &target);

        assert!(changes.tables_to_create.is_empty());
        assert_eq!(
            changes.columns_to_add["users"],
            vec![ColumnDef::new("active", "boolean")]
        );
        assert!(changes.columns_to_widen.is_empty());
    }

    #[test]
    fn type_mismatch_carries_source_type() {
        let source = snapshot(vec![TableSchema::new(
            "users",
            vec![ColumnDef::new("name", "character varying")],
        )]);
        let target = snapshot(vec![TableSchema::new(
            "users",
            vec![ColumnDef::new("name", "text")],
        )]);

        let changes = diff_schemas(&source, &target);

        assert_eq!(
            changes.columns_to_widen["users"],
            vec![ColumnDef::new("name", "character varying")]
        );
    }

    #[test]
    fn target_only_tables_and_columns_are_never_touched() {
        let source = snapshot(vec![users()]);
        let mut target_users = users();
        target_users
            .columns
            .push(ColumnDef::new("legacy_flag", "boolean"));
        let target = snapshot(vec![target_users, orders()]);

        let changes = diff_schemas(&source, &target);

        // Nothing references the target-only table or column, in any form.
        assert!(changes.is_empty());
    }

    #[test]
    fn identical_snapshots_yield_empty_changeset() {
        let source = snapshot(vec![users(), orders()]);
        let target = snapshot(vec![users(), orders()]);
        assert!(diff_schemas(&source, &target).is_empty());
    }

    /// Applying the change-set and diffing again yields an empty change-set.
    #[test]
    fn diff_is_idempotent_after_application() {
        let source = snapshot(vec![
            orders(),
            TableSchema::new(
                "users",
                vec![
                    ColumnDef::new("id", "integer"),
                    ColumnDef::new("name", "character varying"),
                    ColumnDef::new("active", "boolean"),
                ],
            ),
        ]);
        let mut target = snapshot(vec![TableSchema::new(
            "users",
            vec![
                ColumnDef::new("id", "integer"),
                ColumnDef::new("name", "text"),
            ],
        )]);

        let changes = diff_schemas(&source, &target);
        assert!(!changes.is_empty());

        // Apply the change-set to the target snapshot in memory.
        for table in &changes.tables_to_create {
            target.insert(table.name.clone(), table.clone());
        }
        for (table, cols) in &changes.columns_to_add {
            let t = target.get_mut(table).unwrap();
            t.columns.extend(cols.iter().cloned());
        }
        for (table, cols) in &changes.columns_to_widen {
            let t = target.get_mut(table).unwrap();
            for col in cols {
                t.columns
                    .iter_mut()
                    .find(|c| c.name == col.name)
                    .unwrap()
                    .type_tag = col.type_tag.clone();
            }
        }

        assert!(diff_schemas(&source, &target).is_empty());
    }
}
