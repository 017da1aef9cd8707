//! Error types for the synchronization library.

use thiserror::Error;

/// Main error type for synchronization operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Could not open a source or target connection.
    #[error("Connection error: {message}\n  Context: {context}")]
    Connection { message: String, context: String },

    /// Catalog metadata query failed (table or column enumeration).
    #[error("Catalog read failed ({context}): {message}")]
    CatalogRead { context: String, message: String },

    /// A single DDL statement was rejected by the target.
    #[error("DDL failed on table {table}{}: {message}", column_suffix(.column))]
    Ddl {
        table: String,
        column: Option<String>,
        message: String,
    },

    /// Full-table scan failed.
    #[error("Record load failed for table {table}: {message}")]
    RecordLoad { table: String, message: String },

    /// Insert/update batch was rejected by the target.
    #[error("Upsert failed for table {table}: {message}")]
    Upsert { table: String, message: String },

    /// Another synchronizer run holds the advisory lock on the target.
    #[error("Another synchronization run is already in progress against this target")]
    Locked,

    /// Database protocol or query error.
    #[error("Database error: {0}")]
    Db(#[from] tokio_postgres::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Run was cancelled (SIGINT, etc.)
    #[error("Synchronization cancelled")]
    Cancelled,
}

fn column_suffix(column: &Option<String>) -> String {
    match column {
        Some(c) => format!(", column {}", c),
        None => String::new(),
    }
}

impl SyncError {
    /// Create a Connection error with context about where it occurred.
    pub fn connection(message: impl Into<String>, context: impl Into<String>) -> Self {
        SyncError::Connection {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Create a CatalogRead error.
    pub fn catalog(context: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::CatalogRead {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a Ddl error for a whole-table statement.
    pub fn ddl(table: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::Ddl {
            table: table.into(),
            column: None,
            message: message.into(),
        }
    }

    /// Create a Ddl error for a column-level statement.
    pub fn ddl_column(
        table: impl Into<String>,
        column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        SyncError::Ddl {
            table: table.into(),
            column: Some(column.into()),
            message: message.into(),
        }
    }

    /// Create a RecordLoad error.
    pub fn record_load(table: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::RecordLoad {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create an Upsert error.
    pub fn upsert(table: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::Upsert {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Process exit code for this error kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncError::Config(_) | SyncError::Yaml(_) => 2,
            SyncError::Locked => 3,
            SyncError::Cancelled => 130,
            _ => 1,
        }
    }
}

/// Result type alias for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ddl_error_display() {
        let err = SyncError::ddl_column("orders", "total", "incompatible type");
        assert_eq!(
            err.to_string(),
            "DDL failed on table orders, column total: incompatible type"
        );

        let err = SyncError::ddl("orders", "permission denied");
        assert_eq!(
            err.to_string(),
            "DDL failed on table orders: permission denied"
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(SyncError::Config("bad".into()).exit_code(), 2);
        assert_eq!(SyncError::Locked.exit_code(), 3);
        assert_eq!(SyncError::Cancelled.exit_code(), 130);
        assert_eq!(SyncError::upsert("t", "boom").exit_code(), 1);
    }
}
