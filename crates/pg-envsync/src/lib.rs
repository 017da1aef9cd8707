//! # pg-envsync
//!
//! Non-destructive schema and reference-data synchronization between two
//! PostgreSQL environments.
//!
//! The library diffs a source environment against a target and applies only
//! additive convergence:
//!
//! - **Schema convergence**: missing tables are created, missing columns
//!   added, diverging column types changed toward the source. Nothing is
//!   ever dropped, renamed, or truncated.
//! - **Keyed data reconciliation**: reference and designated data tables are
//!   matched row-by-row on a single identity column; missing rows are
//!   inserted, diverging rows updated, target-only rows left untouched.
//! - **Idempotence**: running twice against an unchanged source yields an
//!   empty diff and writes nothing the second time.
//! - **Parallel table workers** with an advisory lock guarding the whole run.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pg_envsync::{Config, PgDatabase, Synchronizer};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.yaml")?;
//!     let source = Arc::new(PgDatabase::connect(&config.source, &config.sync, "source").await?);
//!     let target = Arc::new(PgDatabase::connect(&config.target, &config.sync, "target").await?);
//!     let sync = Synchronizer::new(source, target, config.sync.clone());
//!     let result = sync.run(CancellationToken::new()).await?;
//!     println!("{} inserted, {} updated", result.rows_inserted, result.rows_updated);
//!     Ok(())
//! }
//! ```

pub mod apply;
pub mod config;
pub mod core;
pub mod diff;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod testing;
pub mod typemap;

// Re-exports for convenient access
pub use config::{Config, ConnectionConfig, SyncConfig};
pub use core::{
    CatalogReader, ChangeSet, ColumnDef, DdlTarget, Record, ReconciliationPlan, RowStore,
    SchemaSnapshot, SyncGuard, TableSchema, Value,
};
pub use diff::{diff_records, diff_schemas};
pub use drivers::postgres::PgDatabase;
pub use error::{Result, SyncError};
pub use orchestrator::{SyncPhase, SyncPlan, SyncResult, Synchronizer, TableOutcome, TablePlan};
