//! pg-envsync CLI - non-destructive schema and reference-data
//! synchronization between PostgreSQL environments.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use pg_envsync::{Config, PgDatabase, SyncError, Synchronizer};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "pg-envsync")]
#[command(about = "Non-destructive schema and reference-data synchronization between PostgreSQL environments")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize the target environment toward the source
    Run {
        /// Override number of table workers
        #[arg(long)]
        workers: Option<usize>,

        /// Compute and show the plan without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Test connectivity to both databases
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, SyncError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run { workers, dry_run } => {
            if let Some(w) = workers {
                config.sync.workers = w;
                config.validate()?;
            }

            let cancel_token = setup_signal_handler();

            let source =
                Arc::new(PgDatabase::connect(&config.source, &config.sync, "source").await?);
            let target =
                Arc::new(PgDatabase::connect(&config.target, &config.sync, "target").await?);
            let sync = Synchronizer::new(source, target, config.sync.clone());

            if dry_run {
                let plan = sync.plan().await?;

                if cli.output_json {
                    println!("{}", plan.to_json()?);
                } else if plan.is_empty() {
                    println!("Environments are in sync; nothing to do.");
                } else {
                    println!("Plan:");
                    println!("  Tables to create: {}", plan.changes.table_count());
                    println!("  Columns to add: {}", plan.changes.add_count());
                    println!("  Column types to change: {}", plan.changes.widen_count());
                    for table in &plan.tables {
                        match &table.error {
                            Some(e) => println!("  {}: UNREADABLE ({})", table.table, e),
                            None => println!(
                                "  {}: {} inserts, {} updates",
                                table.table, table.inserts, table.updates
                            ),
                        }
                    }
                }
                return Ok(ExitCode::SUCCESS);
            }

            let result = sync.run(cancel_token).await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nSynchronization {}", result.status);
                println!("  Run ID: {}", result.run_id);
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!("  Tables created: {}", result.tables_created);
                println!("  Columns added: {}", result.columns_added);
                println!("  Column types changed: {}", result.columns_widened);
                println!("  Rows inserted: {}", result.rows_inserted);
                println!("  Rows updated: {}", result.rows_updated);
                if !result.failed_tables.is_empty() {
                    println!("  Failed tables: {:?}", result.failed_tables);
                }
            }

            // A cancelled run exits 130, a run with failed tables 1; a
            // user-aborted run must not look like success.
            Ok(ExitCode::from(result.exit_code()))
        }

        Commands::HealthCheck => {
            let mut healthy = true;

            for (label, conn) in [("source", &config.source), ("target", &config.target)] {
                match PgDatabase::connect(conn, &config.sync, label).await {
                    Ok(db) => match db.ping().await {
                        Ok(latency) => {
                            println!("  {}: OK ({}ms)", label, latency.as_millis());
                        }
                        Err(e) => {
                            println!("  {}: FAILED ({})", label, e);
                            healthy = false;
                        }
                    },
                    Err(e) => {
                        println!("  {}: FAILED ({})", label, e);
                        healthy = false;
                    }
                }
            }

            println!(
                "\n  Overall: {}",
                if healthy { "HEALTHY" } else { "UNHEALTHY" }
            );

            if !healthy {
                return Err(SyncError::Config("Health check failed".to_string()));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM (Kubernetes/cron shutdown).
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    let token_int = cancel_token.clone();
    let token_term = cancel_token.clone();

    tokio::spawn(async move {
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to setup SIGINT handler");
        sigint.recv().await;
        eprintln!("\nReceived SIGINT. Finishing in-flight tables...");
        token_int.cancel();
    });

    tokio::spawn(async move {
        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to setup SIGTERM handler");
        sigterm.recv().await;
        eprintln!("\nReceived SIGTERM. Finishing in-flight tables...");
        token_term.cancel();
    });

    cancel_token
}

/// Setup signal handler for Windows (only SIGINT/Ctrl-C).
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to setup Ctrl-C handler");
        eprintln!("\nReceived Ctrl-C. Finishing in-flight tables...");
        token.cancel();
    });

    cancel_token
}
