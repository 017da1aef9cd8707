//! In-memory database fake for exercising the full synchronization workflow
//! without a live PostgreSQL instance.
//!
//! [`MemoryDatabase`] implements all four capability traits and records an
//! operation log, so tests can assert not just the final state but also batch
//! boundaries (one commit per insert batch, one per update batch) and the
//! absence of destructive statements.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::record::{Record, RecordSet, Value};
use crate::core::schema::{ColumnDef, TableSchema};
use crate::core::traits::{CatalogReader, DdlTarget, RowStore, SyncGuard};
use crate::error::{Result, SyncError};

#[derive(Debug, Default)]
struct MemoryState {
    tables: BTreeMap<String, StoredTable>,
    ops: Vec<String>,
    locked: bool,
}

#[derive(Debug)]
struct StoredTable {
    schema: TableSchema,
    rows: Vec<Record>,
}

/// An in-memory database implementing [`CatalogReader`], [`RowStore`],
/// [`DdlTarget`], and [`SyncGuard`].
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    state: Mutex<MemoryState>,
    /// Tables whose every operation fails, for failure-isolation tests.
    poisoned: Mutex<BTreeSet<String>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table definition, builder style.
    #[must_use]
    pub fn with_table(self, schema: TableSchema) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.tables.insert(
                schema.name.clone(),
                StoredTable {
                    schema,
                    rows: Vec::new(),
                },
            );
        }
        self
    }

    /// Seed rows into an existing table, builder style.
    #[must_use]
    pub fn with_rows(self, table: &str, rows: Vec<Record>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let stored = state
                .tables
                .get_mut(table)
                .unwrap_or_else(|| panic!("seeding rows into unknown table {}", table));
            stored.rows.extend(rows);
        }
        self
    }

    /// Make every operation against one table fail.
    pub fn poison(&self, table: &str) {
        self.poisoned.lock().unwrap().insert(table.to_string());
    }

    /// Current rows of a table.
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Current schema of a table, if it exists.
    pub fn table_schema(&self, table: &str) -> Option<TableSchema> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .map(|t| t.schema.clone())
    }

    /// The recorded operation log.
    pub fn ops(&self) -> Vec<String> {
        self.state.lock().unwrap().ops.clone()
    }

    /// Number of commits in the operation log.
    pub fn commit_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .ops
            .iter()
            .filter(|op| op.as_str() == "commit")
            .count()
    }

    fn check_poisoned(&self, table: &str, make: impl Fn() -> SyncError) -> Result<()> {
        if self.poisoned.lock().unwrap().contains(table) {
            return Err(make());
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogReader for MemoryDatabase {
    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().tables.keys().cloned().collect())
    }

    async fn list_columns(&self, table: &str) -> Result<TableSchema> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .map(|t| t.schema.clone())
            .ok_or_else(|| SyncError::catalog("memory catalog", format!("no such table {}", table)))
    }
}

#[async_trait]
impl RowStore for MemoryDatabase {
    async fn scan(&self, table: &str) -> Result<RecordSet> {
        self.check_poisoned(table, || SyncError::record_load(table, "poisoned"))?;
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .ok_or_else(|| SyncError::record_load(table, "no such table"))
    }

    async fn insert_records(&self, table: &str, records: &[Record]) -> Result<u64> {
        self.check_poisoned(table, || SyncError::upsert(table, "poisoned"))?;
        let mut state = self.state.lock().unwrap();
        state.ops.push("begin".to_string());

        let mut inserted = 0u64;
        for record in records {
            let stored = state
                .tables
                .get_mut(table)
                .ok_or_else(|| SyncError::upsert(table, "no such table"))?;
            stored.rows.push(record.clone());
            inserted += 1;
            state.ops.push(format!("insert {}", table));
        }

        state.ops.push("commit".to_string());
        Ok(inserted)
    }

    async fn update_records(
        &self,
        table: &str,
        records: &[Record],
        identity_field: &str,
    ) -> Result<u64> {
        self.check_poisoned(table, || SyncError::upsert(table, "poisoned"))?;
        let mut state = self.state.lock().unwrap();
        state.ops.push("begin".to_string());

        let mut updated = 0u64;
        for record in records {
            let Some(id) = record.identity(identity_field) else {
                continue;
            };
            let id = id.clone();

            let stored = state
                .tables
                .get_mut(table)
                .ok_or_else(|| SyncError::upsert(table, "no such table"))?;

            for row in stored.rows.iter_mut() {
                if row.identity(identity_field) == Some(&id) {
                    // Rewrite the non-identity fields present on the record,
                    // leaving target-only fields alone.
                    for (name, value) in record.iter() {
                        if name != identity_field {
                            row.set(name.clone(), value.clone());
                        }
                    }
                    updated += 1;
                }
            }
            state.ops.push(format!("update {}", table));
        }

        state.ops.push("commit".to_string());
        Ok(updated)
    }
}

#[async_trait]
impl DdlTarget for MemoryDatabase {
    async fn create_table(&self, table: &TableSchema) -> Result<()> {
        self.check_poisoned(&table.name, || SyncError::ddl(&table.name, "poisoned"))?;
        let mut state = self.state.lock().unwrap();
        if state.tables.contains_key(&table.name) {
            return Err(SyncError::ddl(&table.name, "table already exists"));
        }
        state.ops.push(format!("create table {}", table.name));
        state.tables.insert(
            table.name.clone(),
            StoredTable {
                schema: table.clone(),
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    async fn add_column(&self, table: &str, column: &ColumnDef) -> Result<()> {
        self.check_poisoned(table, || {
            SyncError::ddl_column(table, &column.name, "poisoned")
        })?;
        let mut state = self.state.lock().unwrap();
        let stored = state
            .tables
            .get_mut(table)
            .ok_or_else(|| SyncError::ddl_column(table, &column.name, "no such table"))?;

        if stored.schema.has_column(&column.name) {
            return Err(SyncError::ddl_column(
                table,
                &column.name,
                "column already exists",
            ));
        }
        stored.schema.columns.push(column.clone());

        // Existing rows get NULL for the new column, like a real ADD COLUMN.
        for row in stored.rows.iter_mut() {
            row.set(column.name.clone(), Value::Null);
        }

        state.ops.push(format!("add column {}.{}", table, column.name));
        Ok(())
    }

    async fn alter_column_type(&self, table: &str, column: &ColumnDef) -> Result<()> {
        self.check_poisoned(table, || {
            SyncError::ddl_column(table, &column.name, "poisoned")
        })?;
        let mut state = self.state.lock().unwrap();
        let stored = state
            .tables
            .get_mut(table)
            .ok_or_else(|| SyncError::ddl_column(table, &column.name, "no such table"))?;

        let existing = stored
            .schema
            .columns
            .iter_mut()
            .find(|c| c.name == column.name)
            .ok_or_else(|| SyncError::ddl_column(table, &column.name, "no such column"))?;
        existing.type_tag = column.type_tag.clone();

        state
            .ops
            .push(format!("alter column {}.{}", table, column.name));
        Ok(())
    }
}

#[async_trait]
impl SyncGuard for MemoryDatabase {
    async fn try_acquire(&self) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.locked {
            return Ok(false);
        }
        state.locked = true;
        state.ops.push("acquire lock".to_string());
        Ok(true)
    }

    async fn release(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.locked = false;
        state.ops.push("release lock".to_string());
        Ok(())
    }
}
