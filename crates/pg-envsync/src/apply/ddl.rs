//! DDL executor: applies an additive change-set against a target.
//!
//! Each statement commits independently. A rejected statement marks that
//! table as failed and the run continues with the next table, so one bad
//! ALTER cannot take the whole run down; partial progress stays applied and
//! the next run converges from wherever this one stopped.

use tracing::{error, info};

use crate::core::schema::ChangeSet;
use crate::core::traits::DdlTarget;
use crate::error::SyncError;

/// Outcome of applying a change-set.
#[derive(Debug, Default)]
pub struct DdlReport {
    /// Tables created.
    pub tables_created: usize,

    /// Columns added across all tables.
    pub columns_added: usize,

    /// Column types changed across all tables.
    pub columns_widened: usize,

    /// Per-table failures; the run continued past each of these.
    pub failures: Vec<(String, SyncError)>,
}

impl DdlReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Apply a change-set to the target, isolating failures per table.
pub async fn apply_changeset<T: DdlTarget + ?Sized>(target: &T, changes: &ChangeSet) -> DdlReport {
    let mut report = DdlReport::default();

    for table in &changes.tables_to_create {
        info!(table = %table.name, columns = table.columns.len(), "creating missing table");
        match target.create_table(table).await {
            Ok(()) => report.tables_created += 1,
            Err(e) => {
                error!(table = %table.name, error = %e, "create table failed");
                report.failures.push((table.name.clone(), e));
            }
        }
    }

    for (table, columns) in &changes.columns_to_add {
        for column in columns {
            info!(table = %table, column = %column.name, "adding missing column");
            if let Err(e) = target.add_column(table, column).await {
                error!(table = %table, column = %column.name, error = %e, "add column failed");
                report.failures.push((table.clone(), e));
                break; // remaining columns of this table are skipped
            }
            report.columns_added += 1;
        }
    }

    for (table, columns) in &changes.columns_to_widen {
        for column in columns {
            info!(
                table = %table,
                column = %column.name,
                new_type = %column.type_tag,
                "changing column type"
            );
            if let Err(e) = target.alter_column_type(table, column).await {
                error!(table = %table, column = %column.name, error = %e, "alter column failed");
                report.failures.push((table.clone(), e));
                break;
            }
            report.columns_widened += 1;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ColumnDef, TableSchema};
    use crate::error::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Target that rejects everything touching one poisoned table.
    struct Flaky {
        poisoned: &'static str,
        applied: Mutex<Vec<String>>,
    }

    impl Flaky {
        fn new(poisoned: &'static str) -> Self {
            Self {
                poisoned,
                applied: Mutex::new(Vec::new()),
            }
        }

        fn guard(&self, table: &str, op: String) -> Result<()> {
            if table == self.poisoned {
                return Err(SyncError::ddl(table, "rejected by target"));
            }
            self.applied.lock().unwrap().push(op);
            Ok(())
        }
    }

    #[async_trait]
    impl DdlTarget for Flaky {
        async fn create_table(&self, table: &TableSchema) -> Result<()> {
            self.guard(&table.name, format!("create {}", table.name))
        }

        async fn add_column(&self, table: &str, column: &ColumnDef) -> Result<()> {
            self.guard(table, format!("add {}.{}", table, column.name))
        }

        async fn alter_column_type(&self, table: &str, column: &ColumnDef) -> Result<()> {
            self.guard(table, format!("widen {}.{}", table, column.name))
        }
    }

    fn changes() -> ChangeSet {
        let mut cs = ChangeSet::default();
        cs.tables_to_create.push(TableSchema::new(
            "orders",
            vec![ColumnDef::new("id", "integer")],
        ));
        cs.columns_to_add.insert(
            "users".into(),
            vec![
                ColumnDef::new("active", "boolean"),
                ColumnDef::new("note", "character varying"),
            ],
        );
        cs.columns_to_widen
            .insert("items".into(), vec![ColumnDef::new("qty", "bigint")]);
        cs
    }

    #[tokio::test]
    async fn clean_changeset_applies_everything() {
        let target = Flaky::new("nonexistent");
        let report = apply_changeset(&target, &changes()).await;

        assert!(report.is_clean());
        assert_eq!(report.tables_created, 1);
        assert_eq!(report.columns_added, 2);
        assert_eq!(report.columns_widened, 1);
    }

    #[tokio::test]
    async fn failure_is_isolated_to_its_table() {
        let target = Flaky::new("users");
        let report = apply_changeset(&target, &changes()).await;

        // users failed, but orders and items still went through.
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "users");
        assert_eq!(report.tables_created, 1);
        assert_eq!(report.columns_added, 0);
        assert_eq!(report.columns_widened, 1);
    }

    #[tokio::test]
    async fn empty_changeset_is_a_noop() {
        let target = Flaky::new("nonexistent");
        let report = apply_changeset(&target, &ChangeSet::default()).await;

        assert!(report.is_clean());
        assert!(target.applied.lock().unwrap().is_empty());
    }
}
