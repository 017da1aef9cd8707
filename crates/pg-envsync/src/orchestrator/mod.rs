//! Synchronization orchestrator - main workflow coordinator.
//!
//! Runs the three phases in order: schema convergence first, then the
//! reference tables, then the designated data tables. Structure must be in
//! place before any row is written, so the schema phase is sequential; the
//! data phases fan out across a bounded worker pool, one task per table.
//!
//! A failing table never aborts the run. Its outcome is tagged failed and
//! every other table still gets its chance to converge; the next run picks
//! up whatever was left.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::apply::ddl::apply_changeset;
use crate::apply::dml::apply_plan;
use crate::config::SyncConfig;
use crate::core::traits::{CatalogReader, DdlTarget, RowStore, SyncGuard};
use crate::diff::{diff_records, diff_schemas};
use crate::error::{Result, SyncError};

/// Which phase a table was synchronized in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Schema,
    ReferenceData,
    DesignatedData,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncPhase::Schema => write!(f, "schema"),
            SyncPhase::ReferenceData => write!(f, "reference data"),
            SyncPhase::DesignatedData => write!(f, "designated data"),
        }
    }
}

/// Per-table outcome of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableOutcome {
    /// Table name.
    pub table: String,

    /// Phase the table belongs to.
    pub phase: SyncPhase,

    /// Rows inserted on the target.
    pub inserted: u64,

    /// Rows updated on the target.
    pub updated: u64,

    /// Failure message, when the table could not be synchronized.
    pub error: Option<String>,
}

impl TableOutcome {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Result of a synchronization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status: "completed", "completed_with_errors", or "cancelled".
    pub status: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Tables created during the schema phase.
    pub tables_created: usize,

    /// Columns added during the schema phase.
    pub columns_added: usize,

    /// Column types changed during the schema phase.
    pub columns_widened: usize,

    /// Total rows inserted across all tables.
    pub rows_inserted: u64,

    /// Total rows updated across all tables.
    pub rows_updated: u64,

    /// Per-table outcomes for the data phases, plus schema-phase failures.
    pub tables: Vec<TableOutcome>,

    /// Names of tables that failed in any phase.
    pub failed_tables: Vec<String>,
}

/// What a run would do, computed without writing anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPlan {
    /// Structural changes the schema phase would apply.
    pub changes: crate::core::ChangeSet,

    /// Per-table insert/update counts the data phases would apply.
    pub tables: Vec<TablePlan>,
}

/// Planned writes for one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablePlan {
    pub table: String,
    pub phase: SyncPhase,
    pub inserts: usize,
    pub updates: usize,
    /// Set when the table could not be read; counts are zero in that case.
    pub error: Option<String>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
            && self
                .tables
                .iter()
                .all(|t| t.inserts == 0 && t.updates == 0 && t.error.is_none())
    }

    /// Render the plan as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl SyncResult {
    pub fn has_failures(&self) -> bool {
        !self.failed_tables.is_empty()
    }

    /// Process exit code this result maps to: 130 for a cancelled run
    /// (matching the signal convention), 1 when any table failed, 0 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.status == "cancelled" {
            130
        } else if self.has_failures() {
            1
        } else {
            0
        }
    }

    /// Render the result as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Synchronization orchestrator.
///
/// Generic over the two database capabilities so the whole workflow runs
/// against the in-memory fake in tests.
pub struct Synchronizer<S, T>
where
    S: CatalogReader + RowStore + 'static,
    T: CatalogReader + RowStore + DdlTarget + SyncGuard + 'static,
{
    source: Arc<S>,
    target: Arc<T>,
    sync: SyncConfig,
}

impl<S, T> Synchronizer<S, T>
where
    S: CatalogReader + RowStore + 'static,
    T: CatalogReader + RowStore + DdlTarget + SyncGuard + 'static,
{
    pub fn new(source: Arc<S>, target: Arc<T>, sync: SyncConfig) -> Self {
        Self {
            source,
            target,
            sync,
        }
    }

    /// Run the synchronization.
    ///
    /// Returns `Err(SyncError::Locked)` when another run already holds the
    /// advisory lock on the target. Per-table failures do not error; they are
    /// reported in the returned [`SyncResult`].
    pub async fn run(&self, cancel: CancellationToken) -> Result<SyncResult> {
        if !self.target.try_acquire().await? {
            return Err(SyncError::Locked);
        }

        let result = self.run_locked(cancel).await;

        // Session close would release the lock anyway; an explicit release
        // failure is not worth masking the run's own outcome.
        if let Err(e) = self.target.release().await {
            warn!("Failed to release sync lock: {}", e);
        }

        result
    }

    async fn run_locked(&self, cancel: CancellationToken) -> Result<SyncResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        info!("Starting synchronization run: {}", run_id);

        let mut outcomes: Vec<TableOutcome> = Vec::new();

        // Phase 1: converge schema
        info!("Phase 1: Converging schema");
        let source_schema = self.source.snapshot().await?;
        let target_schema = self.target.snapshot().await?;

        let changes = diff_schemas(&source_schema, &target_schema);
        info!(
            "Schema diff: {} tables to create, {} columns to add, {} columns to widen",
            changes.table_count(),
            changes.add_count(),
            changes.widen_count()
        );

        let ddl_report = apply_changeset(self.target.as_ref(), &changes).await;
        for (table, err) in &ddl_report.failures {
            outcomes.push(TableOutcome {
                table: table.clone(),
                phase: SyncPhase::Schema,
                inserted: 0,
                updated: 0,
                error: Some(err.to_string()),
            });
        }

        // Phase 2: reference tables
        info!(
            "Phase 2: Synchronizing {} reference tables",
            self.sync.reference_tables.len()
        );
        let reference = self
            .sync_tables(
                &self.sync.reference_tables,
                SyncPhase::ReferenceData,
                &cancel,
            )
            .await;
        outcomes.extend(reference);

        // Phase 3: designated data tables
        info!(
            "Phase 3: Synchronizing {} data tables",
            self.sync.data_tables.len()
        );
        let designated = self
            .sync_tables(&self.sync.data_tables, SyncPhase::DesignatedData, &cancel)
            .await;
        outcomes.extend(designated);

        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let rows_inserted = outcomes.iter().map(|o| o.inserted).sum();
        let rows_updated = outcomes.iter().map(|o| o.updated).sum();

        let mut failed_tables: Vec<String> = outcomes
            .iter()
            .filter(|o| o.is_failed())
            .map(|o| o.table.clone())
            .collect();
        failed_tables.sort();
        failed_tables.dedup();

        let status = if cancel.is_cancelled() {
            "cancelled"
        } else if failed_tables.is_empty() {
            "completed"
        } else {
            "completed_with_errors"
        };

        info!(
            "Run {} {}: {} inserted, {} updated, {} failed tables in {:.1}s",
            run_id,
            status,
            rows_inserted,
            rows_updated,
            failed_tables.len(),
            duration
        );

        Ok(SyncResult {
            run_id,
            status: status.to_string(),
            duration_seconds: duration,
            started_at,
            completed_at,
            tables_created: ddl_report.tables_created,
            columns_added: ddl_report.columns_added,
            columns_widened: ddl_report.columns_widened,
            rows_inserted,
            rows_updated,
            tables: outcomes,
            failed_tables,
        })
    }

    /// Compute what a run would do without writing anything.
    ///
    /// For a table the target does not have yet, every source row counts as
    /// an insert; the scan of the not-yet-created table is skipped. A table
    /// that cannot be read is reported with its error, mirroring how the real
    /// run degrades to a failed outcome instead of aborting.
    pub async fn plan(&self) -> Result<SyncPlan> {
        let source_schema = self.source.snapshot().await?;
        let target_schema = self.target.snapshot().await?;
        let changes = diff_schemas(&source_schema, &target_schema);

        let mut tables = Vec::new();
        let phases = [
            (&self.sync.reference_tables, SyncPhase::ReferenceData),
            (&self.sync.data_tables, SyncPhase::DesignatedData),
        ];
        for (names, phase) in phases {
            for table in names {
                let entry = match self.plan_table(table, &target_schema).await {
                    Ok((inserts, updates)) => TablePlan {
                        table: table.clone(),
                        phase,
                        inserts,
                        updates,
                        error: None,
                    },
                    Err(e) => {
                        error!("{}: cannot plan - {}", table, e);
                        TablePlan {
                            table: table.clone(),
                            phase,
                            inserts: 0,
                            updates: 0,
                            error: Some(e.to_string()),
                        }
                    }
                };
                tables.push(entry);
            }
        }

        Ok(SyncPlan { changes, tables })
    }

    async fn plan_table(
        &self,
        table: &str,
        target_schema: &crate::core::SchemaSnapshot,
    ) -> Result<(usize, usize)> {
        let source_rows = self.source.scan(table).await?;
        if !target_schema.contains_key(table) {
            return Ok((source_rows.len(), 0));
        }
        let target_rows = self.target.scan(table).await?;
        let plan = diff_records(&source_rows, &target_rows, &self.sync.identity_field);
        Ok((plan.inserts.len(), plan.updates.len()))
    }

    /// Reconcile one list of tables across the bounded worker pool.
    async fn sync_tables(
        &self,
        tables: &[String],
        phase: SyncPhase,
        cancel: &CancellationToken,
    ) -> Vec<TableOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.sync.workers.max(1)));
        let mut handles = Vec::new();

        for table in tables {
            if cancel.is_cancelled() {
                info!("Cancellation requested, stopping new {} tasks", phase);
                break;
            }

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                // Semaphore is never closed; bail out of the loop if it is.
                Err(_) => break,
            };

            let source = self.source.clone();
            let target = self.target.clone();
            let task_table = table.clone();
            let identity = self.sync.identity_field.clone();

            let handle = tokio::spawn(async move {
                let result = sync_one_table(&*source, &*target, &task_table, &identity).await;
                drop(permit);
                result
            });
            handles.push((table.clone(), handle));
        }

        // Keep outcome order aligned with the configured table order.
        let mut by_table: BTreeMap<String, TableOutcome> = BTreeMap::new();
        for (table, handle) in handles {
            let error = match handle.await {
                Ok(Ok(stats)) => {
                    by_table.insert(
                        table.clone(),
                        TableOutcome {
                            table,
                            phase,
                            inserted: stats.0,
                            updated: stats.1,
                            error: None,
                        },
                    );
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(e) => format!("task panicked: {}", e),
            };

            error!("{}: failed - {}", table, error);
            by_table.insert(
                table.clone(),
                TableOutcome {
                    table,
                    phase,
                    inserted: 0,
                    updated: 0,
                    error: Some(error),
                },
            );
        }

        tables
            .iter()
            .filter_map(|t| by_table.remove(t))
            .collect()
    }
}

/// Scan both sides of one table, diff, and apply the plan to the target.
async fn sync_one_table<S, T>(
    source: &S,
    target: &T,
    table: &str,
    identity_field: &str,
) -> Result<(u64, u64)>
where
    S: RowStore + ?Sized,
    T: RowStore + ?Sized,
{
    let source_rows = source.scan(table).await?;
    let target_rows = target.scan(table).await?;

    let plan = diff_records(&source_rows, &target_rows, identity_field);
    if plan.is_empty() {
        info!("{}: already in sync ({} rows)", table, source_rows.len());
        return Ok((0, 0));
    }

    let stats = apply_plan(target, table, &plan, identity_field).await?;
    Ok((stats.inserted, stats.updated))
}
