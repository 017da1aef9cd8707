//! Core traits for engine-agnostic schema and data synchronization.
//!
//! The diff-and-reconcile engine consumes databases only through these narrow
//! capability sets:
//!
//! - [`CatalogReader`]: lists tables and columns from live catalog metadata
//! - [`RowStore`]: full-table scans plus insert/update batches
//! - [`DdlTarget`]: applies additive structural changes
//! - [`SyncGuard`]: advisory single-flight lock around a whole run
//!
//! The Postgres driver implements all four; tests substitute the in-memory
//! fake in [`crate::testing`] instead of patching anything global.

use async_trait::async_trait;

use crate::error::Result;

use super::record::{Record, RecordSet};
use super::schema::{ColumnDef, SchemaSnapshot, TableSchema};

/// Read table and column metadata from a live catalog.
///
/// Base tables only; views and system tables are excluded. Column order is
/// the catalog's physical (ordinal) position.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// List base table names.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Read the ordered column definitions of one table.
    async fn list_columns(&self, table: &str) -> Result<TableSchema>;

    /// Build the full schema snapshot.
    ///
    /// Template method: the default implementation lists tables and loads
    /// columns one table at a time.
    async fn snapshot(&self) -> Result<SchemaSnapshot> {
        let mut snapshot = SchemaSnapshot::new();
        for table in self.list_tables().await? {
            let schema = self.list_columns(&table).await?;
            snapshot.insert(table, schema);
        }
        Ok(snapshot)
    }
}

/// Read and write table rows.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Full unfiltered scan of a table, field order taken from the result's
    /// row description.
    async fn scan(&self, table: &str) -> Result<RecordSet>;

    /// Insert the given records, one statement per record naming exactly the
    /// record's present fields, with a single commit after the whole batch.
    ///
    /// Returns the number of rows inserted.
    async fn insert_records(&self, table: &str, records: &[Record]) -> Result<u64>;

    /// Update the given records by identity, rewriting all non-identity
    /// fields present on each record, with a single commit after the whole
    /// batch. Records lacking the identity field must be skipped by the
    /// caller; implementations may assume it is present.
    ///
    /// Returns the number of rows updated.
    async fn update_records(
        &self,
        table: &str,
        records: &[Record],
        identity_field: &str,
    ) -> Result<u64>;
}

/// Apply additive structural changes to a target database.
///
/// There is deliberately no drop, rename, or truncate operation here; the
/// trait surface itself guarantees the no-data-loss property.
#[async_trait]
pub trait DdlTarget: Send + Sync {
    /// Create a table with the given definition, committing immediately.
    async fn create_table(&self, table: &TableSchema) -> Result<()>;

    /// Add a column to an existing table, committing immediately.
    async fn add_column(&self, table: &str, column: &ColumnDef) -> Result<()>;

    /// Change a column's type to the given tag's native type, committing
    /// immediately. Whether the change is actually a widening is left to the
    /// target engine to accept or reject.
    async fn alter_column_type(&self, table: &str, column: &ColumnDef) -> Result<()>;
}

/// Advisory single-flight lock so two synchronizer runs against the same
/// target cannot interleave DDL and DML.
#[async_trait]
pub trait SyncGuard: Send + Sync {
    /// Try to take the lock. Returns `false` when another run holds it.
    async fn try_acquire(&self) -> Result<bool>;

    /// Release the lock. Best effort; session close releases it regardless.
    async fn release(&self) -> Result<()>;
}
