//! Row scan and batched insert/update execution.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;
use tracing::debug;
use uuid::Uuid;

use crate::apply::dml::{build_insert, build_update};
use crate::core::record::{Record, RecordSet, Value};
use crate::core::traits::RowStore;
use crate::error::{Result, SyncError};

use super::PgDatabase;

#[async_trait]
impl RowStore for PgDatabase {
    async fn scan(&self, table: &str) -> Result<RecordSet> {
        let client = self.client("scan").await?;

        let query = format!("SELECT * FROM {}", self.qualify(table));
        let rows = client
            .query(&query, &[])
            .await
            .map_err(|e| SyncError::record_load(table, e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(row_to_record(row, table)?);
        }

        debug!(
            "Scanned {} rows from {}.{}",
            records.len(),
            self.label(),
            table
        );
        Ok(records)
    }

    async fn insert_records(&self, table: &str, records: &[Record]) -> Result<u64> {
        let mut client = self.client("insert_records").await?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| SyncError::upsert(table, e.to_string()))?;

        let mut inserted = 0u64;
        for record in records {
            let (sql, values) = build_insert(table, record);
            let params: Vec<&(dyn ToSql + Sync)> =
                values.iter().map(|v| *v as &(dyn ToSql + Sync)).collect();
            inserted += tx
                .execute(&sql, &params)
                .await
                .map_err(|e| SyncError::upsert(table, e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| SyncError::upsert(table, e.to_string()))?;
        Ok(inserted)
    }

    async fn update_records(
        &self,
        table: &str,
        records: &[Record],
        identity_field: &str,
    ) -> Result<u64> {
        let mut client = self.client("update_records").await?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| SyncError::upsert(table, e.to_string()))?;

        let mut updated = 0u64;
        for record in records {
            let Some((sql, values)) = build_update(table, record, identity_field) else {
                continue;
            };
            let params: Vec<&(dyn ToSql + Sync)> =
                values.iter().map(|v| *v as &(dyn ToSql + Sync)).collect();
            updated += tx
                .execute(&sql, &params)
                .await
                .map_err(|e| SyncError::upsert(table, e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| SyncError::upsert(table, e.to_string()))?;
        Ok(updated)
    }
}

/// Convert one result row into a [`Record`], field order following the row
/// description.
fn row_to_record(row: &Row, table: &str) -> Result<Record> {
    let mut record = Record::new();
    for (idx, col) in row.columns().iter().enumerate() {
        let value = read_value(row, idx, col.type_().name())
            .map_err(|e| SyncError::record_load(table, format!("column {}: {}", col.name(), e)))?;
        record.set(col.name(), value);
    }
    Ok(record)
}

/// Decode one column into the tagged scalar model.
///
/// Native bool/int/float/text types map directly; everything else is read
/// back in its canonical text form so it still participates in strict
/// equality comparison.
fn read_value(row: &Row, idx: usize, type_name: &str) -> std::result::Result<Value, tokio_postgres::Error> {
    let value = match type_name {
        "bool" => row
            .try_get::<_, Option<bool>>(idx)?
            .map_or(Value::Null, Value::Bool),
        "int2" => row
            .try_get::<_, Option<i16>>(idx)?
            .map_or(Value::Null, |v| Value::Int(v as i64)),
        "int4" => row
            .try_get::<_, Option<i32>>(idx)?
            .map_or(Value::Null, |v| Value::Int(v as i64)),
        "int8" => row
            .try_get::<_, Option<i64>>(idx)?
            .map_or(Value::Null, Value::Int),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)?
            .map_or(Value::Null, |v| Value::Float(v as f64)),
        "float8" => row
            .try_get::<_, Option<f64>>(idx)?
            .map_or(Value::Null, Value::Float),
        "numeric" => row
            .try_get::<_, Option<Decimal>>(idx)?
            .map_or(Value::Null, |v| Value::Text(v.to_string())),
        "uuid" => row
            .try_get::<_, Option<Uuid>>(idx)?
            .map_or(Value::Null, |v| Value::Text(v.to_string())),
        "timestamp" => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map_or(Value::Null, |v| Value::Text(v.to_string())),
        "timestamptz" => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map_or(Value::Null, |v| Value::Text(v.to_rfc3339())),
        "date" => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map_or(Value::Null, |v| Value::Text(v.to_string())),
        "time" => row
            .try_get::<_, Option<NaiveTime>>(idx)?
            .map_or(Value::Null, |v| Value::Text(v.to_string())),
        "json" | "jsonb" => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map_or(Value::Null, |v| Value::Text(v.to_string())),
        _ => row
            .try_get::<_, Option<String>>(idx)?
            .map_or(Value::Null, Value::Text),
    };
    Ok(value)
}
