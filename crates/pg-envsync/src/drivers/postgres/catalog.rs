//! Live schema inspection via information_schema.

use async_trait::async_trait;
use tracing::debug;

use crate::core::schema::{ColumnDef, TableSchema};
use crate::core::traits::CatalogReader;
use crate::error::{Result, SyncError};

use super::PgDatabase;

#[async_trait]
impl CatalogReader for PgDatabase {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let client = self.client("list_tables").await?;

        let query = r#"
            SELECT table_name
            FROM information_schema.tables
            WHERE table_type = 'BASE TABLE'
              AND table_schema = $1
            ORDER BY table_name
        "#;

        let rows = client
            .query(query, &[&self.schema()])
            .await
            .map_err(|e| {
                SyncError::catalog(
                    format!("listing tables in {}", self.label()),
                    e.to_string(),
                )
            })?;

        let tables: Vec<String> = rows.iter().map(|row| row.get::<_, String>(0)).collect();
        debug!(
            "Found {} tables in {} schema '{}'",
            tables.len(),
            self.label(),
            self.schema()
        );
        Ok(tables)
    }

    async fn list_columns(&self, table: &str) -> Result<TableSchema> {
        let client = self.client("list_columns").await?;

        let query = r#"
            SELECT column_name, data_type
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
        "#;

        let rows = client
            .query(query, &[&self.schema(), &table])
            .await
            .map_err(|e| {
                SyncError::catalog(
                    format!("reading columns of {}.{}", self.label(), table),
                    e.to_string(),
                )
            })?;

        let columns: Vec<ColumnDef> = rows
            .iter()
            .map(|row| ColumnDef::new(row.get::<_, String>(0), row.get::<_, String>(1)))
            .collect();

        debug!(
            "Loaded {} columns for {}.{}",
            columns.len(),
            self.label(),
            table
        );
        Ok(TableSchema::new(table, columns))
    }
}
