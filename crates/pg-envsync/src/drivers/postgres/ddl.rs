//! Additive DDL execution against the target.
//!
//! Every statement runs in autocommit mode so a later failure never rolls
//! back structure that was already applied.

use async_trait::async_trait;
use tracing::info;

use crate::apply::dml::quote_ident;
use crate::core::schema::{ColumnDef, TableSchema};
use crate::core::traits::DdlTarget;
use crate::error::{Result, SyncError};
use crate::typemap::postgres_ddl_type;

use super::PgDatabase;

const INTEGER_TAGS: &[&str] = &["integer", "int", "int4"];

#[async_trait]
impl DdlTarget for PgDatabase {
    async fn create_table(&self, table: &TableSchema) -> Result<()> {
        let client = self.client("create_table").await?;

        let mut defs = Vec::with_capacity(table.columns.len());
        for col in &table.columns {
            defs.push(self.column_def(col));
        }

        let sql = format!(
            "CREATE TABLE {} ({})",
            self.qualify(&table.name),
            defs.join(", ")
        );

        client
            .execute(&sql, &[])
            .await
            .map_err(|e| SyncError::ddl(&table.name, e.to_string()))?;

        info!(
            "Created table {}.{} with {} columns",
            self.label(),
            table.name,
            table.columns.len()
        );
        Ok(())
    }

    async fn add_column(&self, table: &str, column: &ColumnDef) -> Result<()> {
        let client = self.client("add_column").await?;

        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            self.qualify(table),
            quote_ident(&column.name),
            postgres_ddl_type(&column.type_tag)
        );

        client
            .execute(&sql, &[])
            .await
            .map_err(|e| SyncError::ddl_column(table, &column.name, e.to_string()))?;

        info!(
            "Added column {}.{}.{} ({})",
            self.label(),
            table,
            column.name,
            column.type_tag
        );
        Ok(())
    }

    async fn alter_column_type(&self, table: &str, column: &ColumnDef) -> Result<()> {
        let client = self.client("alter_column_type").await?;

        let sql = format!(
            "ALTER TABLE {} ALTER COLUMN {} TYPE {}",
            self.qualify(table),
            quote_ident(&column.name),
            postgres_ddl_type(&column.type_tag)
        );

        client
            .execute(&sql, &[])
            .await
            .map_err(|e| SyncError::ddl_column(table, &column.name, e.to_string()))?;

        info!(
            "Altered column {}.{}.{} to {}",
            self.label(),
            table,
            column.name,
            column.type_tag
        );
        Ok(())
    }
}

impl PgDatabase {
    /// Render one column definition for CREATE TABLE.
    ///
    /// The identity column becomes SERIAL PRIMARY KEY when its source type is
    /// integral, so inserts that omit it still get generated keys.
    fn column_def(&self, col: &ColumnDef) -> String {
        if col.name == self.identity_field {
            if INTEGER_TAGS.contains(&col.type_tag.as_str()) {
                return format!("{} SERIAL PRIMARY KEY", quote_ident(&col.name));
            }
            return format!(
                "{} {} PRIMARY KEY",
                quote_ident(&col.name),
                postgres_ddl_type(&col.type_tag)
            );
        }
        format!(
            "{} {}",
            quote_ident(&col.name),
            postgres_ddl_type(&col.type_tag)
        )
    }
}
