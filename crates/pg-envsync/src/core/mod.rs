//! Core data model and capability traits.

pub mod record;
pub mod schema;
pub mod traits;

pub use record::{Record, RecordSet, ReconciliationPlan, Value};
pub use schema::{ChangeSet, ColumnDef, SchemaSnapshot, TableSchema};
pub use traits::{CatalogReader, DdlTarget, RowStore, SyncGuard};
