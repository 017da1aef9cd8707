//! Configuration validation.

use crate::error::{Result, SyncError};

use super::types::{Config, ConnectionConfig};

const VALID_SSL_MODES: &[&str] = &["disable", "require", "verify-ca", "verify-full"];

/// Validate a loaded configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_connection("source", &config.source)?;
    validate_connection("target", &config.target)?;

    if config.sync.identity_field.trim().is_empty() {
        return Err(SyncError::Config(
            "sync.identity_field must not be empty".to_string(),
        ));
    }

    if config.sync.workers == 0 {
        return Err(SyncError::Config(
            "sync.workers must be at least 1".to_string(),
        ));
    }

    if config.sync.max_connections == 0 {
        return Err(SyncError::Config(
            "sync.max_connections must be at least 1".to_string(),
        ));
    }

    for (section, tables) in [
        ("sync.reference_tables", &config.sync.reference_tables),
        ("sync.data_tables", &config.sync.data_tables),
    ] {
        for table in tables {
            if table.trim().is_empty() {
                return Err(SyncError::Config(format!(
                    "{} contains an empty table name",
                    section
                )));
            }
        }
    }

    Ok(())
}

fn validate_connection(side: &str, conn: &ConnectionConfig) -> Result<()> {
    if conn.host.trim().is_empty() {
        return Err(SyncError::Config(format!("{}.host is required", side)));
    }
    if conn.database.trim().is_empty() {
        return Err(SyncError::Config(format!("{}.database is required", side)));
    }
    if conn.user.trim().is_empty() {
        return Err(SyncError::Config(format!("{}.user is required", side)));
    }
    if !VALID_SSL_MODES.contains(&conn.ssl_mode.to_lowercase().as_str()) {
        return Err(SyncError::Config(format!(
            "{}.ssl_mode '{}' is invalid. Valid options: {}",
            side,
            conn.ssl_mode,
            VALID_SSL_MODES.join(", ")
        )));
    }
    Ok(())
}
