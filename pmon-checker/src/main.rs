//! pmon-checker - Recipe parser accuracy monitor
//!
//! Re-fetches a random sample of recently ingested recipe pages, scores the
//! stored ingredient extraction against the live page, and aggregates parser
//! health into weekly reports. Runs as an HTTP service (`serve`) or as
//! one-shot commands suitable for cron.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Duration as ChronoDuration;
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pmon_checker::config::{build_accuracy_checker, build_weekly_reporter, ResolvedPaths};
use pmon_checker::services::AccuracyRunOutcome;
use pmon_checker::AppState;
use pmon_common::config::{resolve_root_folder, TomlConfig, ROOT_FOLDER_ENV_VAR};
use pmon_common::db::{init_database, parsers};

/// Version assigned to newly provisioned parsers
const INITIAL_PARSER_VERSION: &str = "1.0.0";

/// Command-line arguments for pmon-checker
#[derive(Parser, Debug)]
#[command(name = "pmon-checker")]
#[command(about = "Recipe parser accuracy monitor")]
#[command(version)]
struct Args {
    /// Configuration file (overrides PMON_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Root folder for the database, snapshot and reports (overrides PMON_ROOT_FOLDER)
    #[arg(short, long, global = true)]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP trigger service
    Serve {
        /// Port to listen on (defaults to the configured port)
        #[arg(short, long, env = "PMON_PORT")]
        port: Option<u16>,
    },
    /// Run one accuracy check and exit
    CheckAccuracy {
        /// Parser to check (defaults to the configured parser)
        #[arg(long)]
        parser: Option<String>,
    },
    /// Generate the weekly report and exit
    WeeklyReport,
    /// Create the database and provision the parser record
    Init {
        /// Parser to provision (defaults to the configured parser)
        #[arg(long)]
        parser: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, config_path) = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &config_path {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => warn!("No configuration file found, using built-in defaults"),
    }

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV_VAR, &config);
    let paths = ResolvedPaths::resolve(&config, &root_folder);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        "Starting pmon-checker"
    );
    info!("Root folder: {}", paths.root_folder.display());
    info!("Database: {}", paths.database.display());

    let db = init_database(&paths.database)
        .await
        .context("Failed to open database")?;

    let result = match args.command {
        Command::Serve { port } => serve(db.clone(), &config, &paths, port).await,
        Command::CheckAccuracy { parser } => {
            check_accuracy(db.clone(), &config, &paths, parser).await
        }
        Command::WeeklyReport => weekly_report(db.clone(), &config, &paths).await,
        Command::Init { parser } => init(&db, &config, parser).await,
    };

    db.close().await;
    result
}

async fn serve(
    db: SqlitePool,
    config: &TomlConfig,
    paths: &ResolvedPaths,
    port: Option<u16>,
) -> Result<()> {
    let checker = build_accuracy_checker(db.clone(), config, paths)
        .context("Failed to build accuracy checker")?;
    let reporter = build_weekly_reporter(db.clone(), config, paths);

    let state = AppState::new(db, checker, reporter, config.accuracy.parser_name.clone());
    let app = pmon_checker::build_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port.unwrap_or(config.port)));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn check_accuracy(
    db: SqlitePool,
    config: &TomlConfig,
    paths: &ResolvedPaths,
    parser: Option<String>,
) -> Result<()> {
    let parser = parser.unwrap_or_else(|| config.accuracy.parser_name.clone());
    let checker = build_accuracy_checker(db, config, paths)
        .context("Failed to build accuracy checker")?;

    match checker.check_parser_accuracy(&parser).await {
        AccuracyRunOutcome::Failed { error, .. } => bail!("Accuracy check failed: {}", error),
        outcome => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
    }
}

async fn weekly_report(db: SqlitePool, config: &TomlConfig, paths: &ResolvedPaths) -> Result<()> {
    let reporter = build_weekly_reporter(db, config, paths);

    match reporter.generate_weekly_report().await {
        Some(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        None => bail!("Weekly report generation failed"),
    }
}

async fn init(db: &SqlitePool, config: &TomlConfig, parser: Option<String>) -> Result<()> {
    let name = parser.unwrap_or_else(|| config.accuracy.parser_name.clone());
    let interval = ChronoDuration::days(config.accuracy.next_run_interval_days.max(0));

    let (record, created) = parsers::provision_parser(
        db,
        &name,
        INITIAL_PARSER_VERSION,
        pmon_common::time::now(),
        interval,
    )
    .await
    .context("Failed to provision parser")?;

    if created {
        info!(parser = %record.name, "Parser record created");
    } else {
        info!(parser = %record.name, "Parser record already present");
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
