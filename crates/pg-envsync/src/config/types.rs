//! Configuration type definitions.

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database connection (the environment ahead of the target).
    pub source: ConnectionConfig,

    /// Target database connection (the environment to converge).
    pub target: ConnectionConfig,

    /// Synchronization behavior.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Connection parameters for one PostgreSQL instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Schema holding the synchronized tables (default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// SSL mode (default: "require").
    #[serde(default = "default_require")]
    pub ssl_mode: String,
}

/// Synchronization behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Reference (lookup/golden-data) tables synchronized in full every run.
    #[serde(default)]
    pub reference_tables: Vec<String>,

    /// Designated operational tables requiring the same reconciliation.
    #[serde(default)]
    pub data_tables: Vec<String>,

    /// The single column used to match source and target records.
    #[serde(default = "default_identity_field")]
    pub identity_field: String,

    /// Bounded worker pool size for per-table data phases.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Per-statement timeout applied on pooled connections, in milliseconds.
    /// Zero disables the timeout.
    #[serde(default)]
    pub statement_timeout_ms: u64,

    /// Maximum pooled connections per side.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reference_tables: Vec::new(),
            data_tables: Vec::new(),
            identity_field: default_identity_field(),
            workers: default_workers(),
            statement_timeout_ms: 0,
            max_connections: default_max_connections(),
        }
    }
}

fn default_pg_port() -> u16 {
    5432
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_require() -> String {
    "require".to_string()
}

fn default_identity_field() -> String {
    "id".to_string()
}

fn default_workers() -> usize {
    4
}

fn default_max_connections() -> usize {
    8
}
