//! Executors that apply diff output to the target database.

pub mod ddl;
pub mod dml;

pub use ddl::{apply_changeset, DdlReport};
pub use dml::{apply_plan, build_insert, build_update, UpsertStats};
