//! Schema metadata types for database tables and columns.
//!
//! These types provide an engine-neutral representation of the table/column
//! inventory of one database instance, plus the additive change-set computed
//! between two snapshots.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column metadata: a name plus its semantic type tag.
///
/// The type tag is the classification reported by the catalog
/// (e.g. `integer`, `character varying`, `boolean`). Tags are compared by
/// exact equality; mapping back to native DDL types happens in [`crate::typemap`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,

    /// Semantic type tag from the catalog.
    pub type_tag: String,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
        }
    }
}

/// Table metadata.
///
/// Column order is the catalog's ordinal order. It is significant only for
/// DDL generation, never for comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,

    /// Column definitions in ordinal order.
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Check whether the table defines a column with the given name.
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

/// The full table/column inventory of one database instance at one point in time.
///
/// Built fresh on every sync invocation; never cached across runs.
pub type SchemaSnapshot = BTreeMap<String, TableSchema>;

/// The additive set of structural changes required to converge the target
/// schema toward the source schema.
///
/// Purely additive by construction: no entry ever instructs a drop, rename,
/// or narrowing. Re-applying a change-set to an already-converged pair of
/// schemas yields an empty change-set on the next diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Tables present on the source but absent on the target, with their full
    /// source definition.
    pub tables_to_create: Vec<TableSchema>,

    /// Per existing table, columns present on the source but absent on the target.
    pub columns_to_add: BTreeMap<String, Vec<ColumnDef>>,

    /// Per existing table, columns whose type tag differs; carries the source's
    /// type as the desired type.
    pub columns_to_widen: BTreeMap<String, Vec<ColumnDef>>,
}

impl ChangeSet {
    /// Check whether the change-set contains no work at all.
    pub fn is_empty(&self) -> bool {
        self.tables_to_create.is_empty()
            && self.columns_to_add.is_empty()
            && self.columns_to_widen.is_empty()
    }

    /// Number of tables to create.
    pub fn table_count(&self) -> usize {
        self.tables_to_create.len()
    }

    /// Total number of columns to add across all tables.
    pub fn add_count(&self) -> usize {
        self.columns_to_add.values().map(Vec::len).sum()
    }

    /// Total number of columns to widen across all tables.
    pub fn widen_count(&self) -> usize {
        self.columns_to_widen.values().map(Vec::len).sum()
    }
}
