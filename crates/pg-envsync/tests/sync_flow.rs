//! End-to-end synchronization workflow over the in-memory database fake.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use pg_envsync::testing::MemoryDatabase;
use pg_envsync::{
    ColumnDef, Record, SyncConfig, SyncError, SyncGuard, Synchronizer, TableSchema, Value,
};

fn users_schema() -> TableSchema {
    TableSchema::new(
        "users",
        vec![
            ColumnDef::new("id", "integer"),
            ColumnDef::new("name", "character varying"),
        ],
    )
}

fn ref_schema() -> TableSchema {
    TableSchema::new(
        "some_ref_table",
        vec![
            ColumnDef::new("id", "integer"),
            ColumnDef::new("name", "character varying"),
        ],
    )
}

fn sync_config(reference: &[&str], data: &[&str]) -> SyncConfig {
    SyncConfig {
        reference_tables: reference.iter().map(|s| s.to_string()).collect(),
        data_tables: data.iter().map(|s| s.to_string()).collect(),
        ..SyncConfig::default()
    }
}

fn synchronizer(
    source: Arc<MemoryDatabase>,
    target: Arc<MemoryDatabase>,
    sync: SyncConfig,
) -> Synchronizer<MemoryDatabase, MemoryDatabase> {
    Synchronizer::new(source, target, sync)
}

#[tokio::test]
async fn schema_and_data_converge_in_one_run() {
    // Source is one table and one column ahead of the target.
    let source = Arc::new(
        MemoryDatabase::new()
            .with_table(ref_schema())
            .with_table(TableSchema::new(
                "users",
                vec![
                    ColumnDef::new("id", "integer"),
                    ColumnDef::new("name", "character varying"),
                    ColumnDef::new("active", "boolean"),
                ],
            ))
            .with_rows(
                "some_ref_table",
                vec![
                    Record::new().with("id", 1).with("name", "TestName1"),
                    Record::new().with("id", 2).with("name", "TestName2"),
                ],
            ),
    );
    let target = Arc::new(
        MemoryDatabase::new()
            .with_table(users_schema())
            .with_rows("users", vec![]),
    );

    let sync = synchronizer(
        source,
        target.clone(),
        sync_config(&["some_ref_table"], &[]),
    );
    let result = sync.run(CancellationToken::new()).await.unwrap();

    assert_eq!(result.status, "completed");
    assert_eq!(result.tables_created, 1);
    assert_eq!(result.columns_added, 1);
    assert_eq!(result.rows_inserted, 2);
    assert_eq!(result.rows_updated, 0);

    // The created table carries the full source definition.
    let created = target.table_schema("some_ref_table").unwrap();
    assert!(created.has_column("name"));
    assert!(target.table_schema("users").unwrap().has_column("active"));
    assert_eq!(target.rows("some_ref_table").len(), 2);
}

#[tokio::test]
async fn diverged_rows_update_and_target_only_rows_survive() {
    let source = Arc::new(MemoryDatabase::new().with_table(ref_schema()).with_rows(
        "some_ref_table",
        vec![
            Record::new().with("id", 1).with("name", "TestName1"),
            Record::new().with("id", 2).with("name", "TestName2"),
        ],
    ));
    let target = Arc::new(MemoryDatabase::new().with_table(ref_schema()).with_rows(
        "some_ref_table",
        vec![
            Record::new().with("id", 1).with("name", "OldName"),
            Record::new().with("id", 99).with("name", "target only"),
        ],
    ));

    let sync = synchronizer(
        source,
        target.clone(),
        sync_config(&["some_ref_table"], &[]),
    );
    let result = sync.run(CancellationToken::new()).await.unwrap();

    assert_eq!(result.rows_inserted, 1);
    assert_eq!(result.rows_updated, 1);

    let rows = target.rows("some_ref_table");
    assert_eq!(rows.len(), 3);
    assert!(rows
        .iter()
        .any(|r| r.get("name") == Some(&Value::Text("TestName1".into()))));
    // The target-only row is never deleted or modified.
    assert!(rows
        .iter()
        .any(|r| r.get("name") == Some(&Value::Text("target only".into()))));
}

#[tokio::test]
async fn second_run_writes_nothing() {
    let source = Arc::new(MemoryDatabase::new().with_table(ref_schema()).with_rows(
        "some_ref_table",
        vec![Record::new().with("id", 1).with("name", "a")],
    ));
    let target = Arc::new(MemoryDatabase::new());

    let sync_cfg = sync_config(&["some_ref_table"], &[]);

    let first = synchronizer(source.clone(), target.clone(), sync_cfg.clone());
    let result = first.run(CancellationToken::new()).await.unwrap();
    assert_eq!(result.tables_created, 1);
    assert_eq!(result.rows_inserted, 1);

    let commits_after_first = target.commit_count();

    let second = synchronizer(source, target.clone(), sync_cfg);
    let result = second.run(CancellationToken::new()).await.unwrap();

    assert_eq!(result.status, "completed");
    assert_eq!(result.tables_created, 0);
    assert_eq!(result.columns_added, 0);
    assert_eq!(result.rows_inserted, 0);
    assert_eq!(result.rows_updated, 0);
    // An empty plan is a strict no-op: not even an empty transaction.
    assert_eq!(target.commit_count(), commits_after_first);
}

#[tokio::test]
async fn insert_and_update_batches_commit_separately() {
    let source = Arc::new(MemoryDatabase::new().with_table(ref_schema()).with_rows(
        "some_ref_table",
        vec![
            Record::new().with("id", 1).with("name", "updated"),
            Record::new().with("id", 2).with("name", "new"),
            Record::new().with("id", 3).with("name", "also new"),
        ],
    ));
    let target = Arc::new(MemoryDatabase::new().with_table(ref_schema()).with_rows(
        "some_ref_table",
        vec![Record::new().with("id", 1).with("name", "stale")],
    ));

    let sync = synchronizer(
        source,
        target.clone(),
        sync_config(&["some_ref_table"], &[]),
    );
    let result = sync.run(CancellationToken::new()).await.unwrap();

    assert_eq!(result.rows_inserted, 2);
    assert_eq!(result.rows_updated, 1);
    // One commit for the insert batch, one for the update batch.
    assert_eq!(target.commit_count(), 2);
}

#[tokio::test]
async fn failing_table_does_not_abort_the_run() {
    let source = Arc::new(
        MemoryDatabase::new()
            .with_table(ref_schema())
            .with_table(users_schema())
            .with_rows(
                "some_ref_table",
                vec![Record::new().with("id", 1).with("name", "a")],
            )
            .with_rows(
                "users",
                vec![Record::new().with("id", 1).with("name", "u")],
            ),
    );
    let target = Arc::new(
        MemoryDatabase::new()
            .with_table(ref_schema())
            .with_table(users_schema()),
    );
    target.poison("some_ref_table");

    let sync = synchronizer(
        source,
        target.clone(),
        sync_config(&["some_ref_table"], &["users"]),
    );
    let result = sync.run(CancellationToken::new()).await.unwrap();

    // The poisoned table is tagged failed; the healthy one still converged.
    assert_eq!(result.status, "completed_with_errors");
    assert_eq!(result.failed_tables, vec!["some_ref_table"]);
    assert_eq!(result.exit_code(), 1);
    assert_eq!(target.rows("users").len(), 1);
}

#[tokio::test]
async fn concurrent_run_is_rejected_by_the_lock() {
    let source = Arc::new(MemoryDatabase::new());
    let target = Arc::new(MemoryDatabase::new());

    // Simulate another run holding the advisory lock.
    assert!(target.try_acquire().await.unwrap());

    let sync = synchronizer(source, target.clone(), sync_config(&[], &[]));
    let err = sync.run(CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, SyncError::Locked));
    assert_eq!(err.exit_code(), 3);
}

#[tokio::test]
async fn lock_is_released_after_the_run() {
    let source = Arc::new(MemoryDatabase::new());
    let target = Arc::new(MemoryDatabase::new());

    let sync = synchronizer(source, target.clone(), sync_config(&[], &[]));
    sync.run(CancellationToken::new()).await.unwrap();

    // A follow-up acquire succeeds, so the run released its lock.
    assert!(target.try_acquire().await.unwrap());
}

#[tokio::test]
async fn cancelled_run_reports_cancelled_status() {
    let source = Arc::new(MemoryDatabase::new().with_table(ref_schema()));
    let target = Arc::new(MemoryDatabase::new().with_table(ref_schema()));

    let cancel = CancellationToken::new();
    cancel.cancel();

    let sync = synchronizer(source, target, sync_config(&["some_ref_table"], &[]));
    let result = sync.run(cancel).await.unwrap();

    // A user-aborted run must not map to a success exit status.
    assert_eq!(result.status, "cancelled");
    assert_eq!(result.rows_inserted, 0);
    assert_eq!(result.exit_code(), 130);
}

#[tokio::test]
async fn clean_run_maps_to_success_exit_code() {
    let source = Arc::new(MemoryDatabase::new().with_table(ref_schema()).with_rows(
        "some_ref_table",
        vec![Record::new().with("id", 1).with("name", "a")],
    ));
    let target = Arc::new(MemoryDatabase::new());

    let sync = synchronizer(source, target, sync_config(&["some_ref_table"], &[]));
    let result = sync.run(CancellationToken::new()).await.unwrap();

    assert_eq!(result.status, "completed");
    assert_eq!(result.exit_code(), 0);
}

#[tokio::test]
async fn plan_reports_counts_without_writing() {
    let source = Arc::new(MemoryDatabase::new().with_table(ref_schema()).with_rows(
        "some_ref_table",
        vec![
            Record::new().with("id", 1).with("name", "updated"),
            Record::new().with("id", 2).with("name", "new"),
        ],
    ));
    let target = Arc::new(MemoryDatabase::new().with_table(ref_schema()).with_rows(
        "some_ref_table",
        vec![Record::new().with("id", 1).with("name", "stale")],
    ));

    let sync = synchronizer(
        source,
        target.clone(),
        sync_config(&["some_ref_table"], &[]),
    );
    let plan = sync.plan().await.unwrap();

    assert!(!plan.is_empty());
    assert_eq!(plan.tables.len(), 1);
    assert_eq!(plan.tables[0].inserts, 1);
    assert_eq!(plan.tables[0].updates, 1);
    // Nothing was written or even begun.
    assert_eq!(target.commit_count(), 0);
    assert_eq!(target.rows("some_ref_table").len(), 1);
}

#[tokio::test]
async fn plan_reports_unreadable_table_instead_of_dying() {
    let source = Arc::new(
        MemoryDatabase::new()
            .with_table(ref_schema())
            .with_table(users_schema())
            .with_rows(
                "users",
                vec![Record::new().with("id", 1).with("name", "u")],
            ),
    );
    source.poison("some_ref_table");
    let target = Arc::new(
        MemoryDatabase::new()
            .with_table(ref_schema())
            .with_table(users_schema()),
    );

    let sync = synchronizer(
        source,
        target,
        sync_config(&["some_ref_table"], &["users"]),
    );
    let plan = sync.plan().await.unwrap();

    // The unreadable table is reported in place; the rest is still planned.
    assert!(!plan.is_empty());
    let bad = plan.tables.iter().find(|t| t.table == "some_ref_table").unwrap();
    assert!(bad.error.is_some());
    let good = plan.tables.iter().find(|t| t.table == "users").unwrap();
    assert_eq!(good.inserts, 1);
    assert!(good.error.is_none());
}

#[tokio::test]
async fn result_serializes_to_json() {
    let source = Arc::new(MemoryDatabase::new());
    let target = Arc::new(MemoryDatabase::new());

    let sync = synchronizer(source, target, sync_config(&[], &[]));
    let result = sync.run(CancellationToken::new()).await.unwrap();

    let json = result.to_json().unwrap();
    assert!(json.contains("\"status\": \"completed\""));
    assert!(json.contains(&result.run_id));
}
