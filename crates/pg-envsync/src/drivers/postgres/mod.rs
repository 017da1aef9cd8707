//! PostgreSQL driver: implements the catalog, row-store, DDL, and
//! single-flight capabilities over a deadpool-postgres pool.

mod catalog;
mod ddl;
mod rows;
mod tls;

use std::time::Duration;

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio::sync::Mutex;
use tokio_postgres::Config as PgConfig;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{info, warn};

use crate::config::{ConnectionConfig, SyncConfig};
use crate::core::traits::SyncGuard;
use crate::error::{Result, SyncError};

use async_trait::async_trait;

/// Connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Application-wide advisory lock key guarding a whole synchronizer run.
const SYNC_LOCK_KEY: i64 = 0x70675f656e76_i64; // "pg_env"

/// One side of the synchronization, backed by a connection pool.
///
/// Implements [`crate::core::CatalogReader`], [`crate::core::RowStore`],
/// [`crate::core::DdlTarget`] and [`SyncGuard`].
pub struct PgDatabase {
    pool: Pool,
    schema: String,
    /// "source" or "target", for log and error context.
    label: String,
    /// Identity column name, marked PRIMARY KEY on created tables.
    identity_field: String,
    /// Connection pinned while the advisory lock is held; the lock is
    /// session-scoped, so the session must outlive the run.
    lock_conn: Mutex<Option<Object>>,
}

impl PgDatabase {
    /// Open a pool against one PostgreSQL instance and verify connectivity.
    pub async fn connect(
        config: &ConnectionConfig,
        sync: &SyncConfig,
        label: impl Into<String>,
    ) -> Result<Self> {
        let label = label.into();

        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(CONNECT_TIMEOUT);

        // DML statements are generated without a schema qualifier; the
        // session search_path pins them to the configured schema.
        let mut options = format!("-c search_path={}", config.schema);
        if sync.statement_timeout_ms > 0 {
            options.push_str(&format!(
                " -c statement_timeout={}",
                sync.statement_timeout_ms
            ));
        }
        pg_config.options(&options);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let pool = match config.ssl_mode.to_lowercase().as_str() {
            "disable" => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
                Pool::builder(mgr)
                    .max_size(sync.max_connections)
                    .build()
                    .map_err(|e| {
                        SyncError::connection(e.to_string(), format!("creating {} pool", label))
                    })?
            }
            mode => {
                let tls_config = tls::build_tls_config(mode)?;
                let tls_connector = MakeRustlsConnect::new(tls_config);
                let mgr = Manager::from_config(pg_config, tls_connector, mgr_config);
                Pool::builder(mgr)
                    .max_size(sync.max_connections)
                    .build()
                    .map_err(|e| {
                        SyncError::connection(e.to_string(), format!("creating {} pool", label))
                    })?
            }
        };

        // Test connection
        let client = pool.get().await.map_err(|e| {
            SyncError::connection(e.to_string(), format!("testing {} connection", label))
        })?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL {}: {}:{}/{}",
            label, config.host, config.port, config.database
        );

        Ok(Self {
            pool,
            schema: config.schema.clone(),
            label,
            identity_field: sync.identity_field.clone(),
            lock_conn: Mutex::new(None),
        })
    }

    /// Connectivity probe, reporting round-trip latency.
    pub async fn ping(&self) -> Result<Duration> {
        let start = std::time::Instant::now();
        let client = self.client("ping").await?;
        client.simple_query("SELECT 1").await?;
        Ok(start.elapsed())
    }

    pub(crate) async fn client(&self, context: &str) -> Result<Object> {
        self.pool.get().await.map_err(|e| {
            SyncError::connection(
                e.to_string(),
                format!("getting {} connection for {}", self.label, context),
            )
        })
    }

    pub(crate) fn schema(&self) -> &str {
        &self.schema
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    /// Schema-qualified, quoted table reference.
    pub(crate) fn qualify(&self, table: &str) -> String {
        format!(
            "{}.{}",
            crate::apply::dml::quote_ident(&self.schema),
            crate::apply::dml::quote_ident(table)
        )
    }
}

#[async_trait]
impl SyncGuard for PgDatabase {
    async fn try_acquire(&self) -> Result<bool> {
        let mut held = self.lock_conn.lock().await;
        if held.is_some() {
            return Ok(true);
        }

        let client = self.client("advisory lock").await?;
        let row = client
            .query_one("SELECT pg_try_advisory_lock($1)", &[&SYNC_LOCK_KEY])
            .await?;
        let acquired: bool = row.get(0);

        if acquired {
            // Pin the session so the lock survives the whole run.
            *held = Some(client);
        }
        Ok(acquired)
    }

    async fn release(&self) -> Result<()> {
        let mut held = self.lock_conn.lock().await;
        if let Some(client) = held.take() {
            client
                .query_one("SELECT pg_advisory_unlock($1)", &[&SYNC_LOCK_KEY])
                .await?;
        }
        Ok(())
    }
}
