//! Upsert executor: applies a reconciliation plan to a row store.
//!
//! Statement text lives in the pure builders so the exact SQL and bind order
//! can be unit tested without a database. Execution and batch commit
//! semantics live behind [`RowStore`].

use tracing::{info, warn};

use crate::core::record::{Record, ReconciliationPlan, Value};
use crate::core::traits::RowStore;
use crate::error::Result;

/// Quote a PostgreSQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Build an INSERT statement naming exactly the record's present fields in
/// iteration order, with positional binds.
pub fn build_insert<'a>(table: &str, record: &'a Record) -> (String, Vec<&'a Value>) {
    let mut columns = Vec::with_capacity(record.len());
    let mut placeholders = Vec::with_capacity(record.len());
    let mut params = Vec::with_capacity(record.len());

    for (idx, (name, value)) in record.iter().enumerate() {
        columns.push(quote_ident(name));
        placeholders.push(format!("${}", idx + 1));
        params.push(value);
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        columns.join(", "),
        placeholders.join(", ")
    );

    (sql, params)
}

/// Build an UPDATE statement over all non-identity fields present on the
/// record, keyed by the identity field.
///
/// Returns `None` when the record lacks the identity field or carries no
/// non-identity fields to set.
pub fn build_update<'a>(
    table: &str,
    record: &'a Record,
    identity_field: &str,
) -> Option<(String, Vec<&'a Value>)> {
    let identity = record.identity(identity_field)?;

    let mut assignments = Vec::new();
    let mut params = Vec::new();

    for (name, value) in record.iter() {
        if name == identity_field {
            continue;
        }
        assignments.push(format!("{} = ${}", quote_ident(name), params.len() + 1));
        params.push(value);
    }

    if assignments.is_empty() {
        return None;
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ${}",
        quote_ident(table),
        assignments.join(", "),
        quote_ident(identity_field),
        params.len() + 1
    );
    params.push(identity);

    Some((sql, params))
}

/// Rows written while applying a reconciliation plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertStats {
    pub inserted: u64,
    pub updated: u64,
}

/// Apply a reconciliation plan to the target store.
///
/// Inserts run as one batch with a single commit, then updates as another.
/// Update records lacking the identity field are skipped with a warning.
/// An empty plan is a strict no-op: no store call is made at all.
pub async fn apply_plan<S: RowStore + ?Sized>(
    store: &S,
    table: &str,
    plan: &ReconciliationPlan,
    identity_field: &str,
) -> Result<UpsertStats> {
    if plan.is_empty() {
        return Ok(UpsertStats::default());
    }

    let mut stats = UpsertStats::default();

    if !plan.inserts.is_empty() {
        stats.inserted = store.insert_records(table, &plan.inserts).await?;
    }

    let updatable: Vec<Record> = plan
        .updates
        .iter()
        .filter(|r| {
            let has_identity = r.identity(identity_field).is_some();
            if !has_identity {
                warn!(table, identity_field, "skipping update record without identity");
            }
            has_identity
        })
        .cloned()
        .collect();

    if !updatable.is_empty() {
        stats.updated = store
            .update_records(table, &updatable, identity_field)
            .await?;
    }

    info!(
        table,
        inserted = stats.inserted,
        updated = stats.updated,
        "reconciliation plan applied"
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_names_fields_in_iteration_order() {
        let record = Record::new().with("id", 1).with("name", "Alpha");
        let (sql, params) = build_insert("my_table", &record);

        assert_eq!(sql, "INSERT INTO \"my_table\" (\"id\", \"name\") VALUES ($1, $2)");
        assert_eq!(params, vec![&Value::Int(1), &Value::Text("Alpha".into())]);
    }

    #[test]
    fn update_rewrites_all_non_identity_fields() {
        let record = Record::new()
            .with("id", 10)
            .with("name", "UpdatedName10")
            .with("desc", "NewDesc10");

        let (sql, params) = build_update("my_table", &record, "id").unwrap();

        assert_eq!(
            sql,
            "UPDATE \"my_table\" SET \"name\" = $1, \"desc\" = $2 WHERE \"id\" = $3"
        );
        assert_eq!(
            params,
            vec![
                &Value::Text("UpdatedName10".into()),
                &Value::Text("NewDesc10".into()),
                &Value::Int(10),
            ]
        );
    }

    #[test]
    fn update_with_single_field() {
        let record = Record::new().with("id", 20).with("name", "UpdatedName20");
        let (sql, params) = build_update("my_table", &record, "id").unwrap();

        assert_eq!(sql, "UPDATE \"my_table\" SET \"name\" = $1 WHERE \"id\" = $2");
        assert_eq!(
            params,
            vec![&Value::Text("UpdatedName20".into()), &Value::Int(20)]
        );
    }

    #[test]
    fn update_without_identity_or_fields_is_none() {
        let no_identity = Record::new().with("name", "x");
        assert!(build_update("t", &no_identity, "id").is_none());

        let identity_only = Record::new().with("id", 1);
        assert!(build_update("t", &identity_only, "id").is_none());
    }

    #[test]
    fn quote_ident_doubles_embedded_quotes() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }
}
