//! The diff-and-reconcile engine.
//!
//! Pure comparison logic with no I/O: [`diff_schemas`] computes the minimal
//! additive structural change-set between two snapshots, [`diff_records`] the
//! minimal insert/update set between two keyed record sets. Idempotence and
//! additivity are guaranteed by construction; the executors in
//! [`crate::apply`] only ever see what these functions emit.

mod records;
mod schema;

pub use records::diff_records;
pub use schema::diff_schemas;
