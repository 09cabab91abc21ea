// # enumbersd - E-number Daemon
//
// Thin integration layer: all record and reconciliation logic lives in
// enumbers-core. The daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Opening the record store and building the catalog client
// 4. Starting the reconciliation scheduler
// 5. Serving the HTTP API until SIGTERM/SIGINT
//
// ## Configuration
//
// ### Storage
// - `ENUMBERS_STORE_TYPE`: file (default) or memory
// - `ENUMBERS_DATA_PATH`: Path to the JSON document (default: enumbers.json)
//
// ### HTTP
// - `ENUMBERS_BIND_ADDR`: Listen address (default: 0.0.0.0:5000)
//
// ### Catalog
// - `ENUMBERS_ADDITIVES_URL`: Additive list endpoint
// - `ENUMBERS_PRODUCT_URL`: Product endpoint base
// - `ENUMBERS_USER_AGENT`: User-Agent sent to the catalog
//
// ### Scheduler
// - `ENUMBERS_SCHEDULER_ENABLED`: Run reconciliation in the background (default: true)
// - `ENUMBERS_RECONCILE_INTERVAL_SECS`: Interval, 60..=604800 (default: 86400)
// - `ENUMBERS_RECONCILE_ON_START`: Reconcile once at startup (default: false)
//
// ### Logging
// - `ENUMBERS_LOG_LEVEL`: trace, debug, info (default), warn, error
//
// ## Example
//
// ```bash
// export ENUMBERS_DATA_PATH=/var/lib/enumbers/enumbers.json
// export ENUMBERS_RECONCILE_ON_START=true
//
// enumbersd
// ```

mod api;
mod config;

use anyhow::{Context, Result};
use config::Config;
use enumbers_core::{ReconcileScheduler, Reconciler, RecordStore, SchedulerEvent, storage};
use enumbers_openfoodfacts::OpenFoodFactsCatalog;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long to wait for the scheduler to stop after the server exits
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum EnumbersExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<EnumbersExitCode> for ExitCode {
    fn from(code: EnumbersExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return EnumbersExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return EnumbersExitCode::ConfigError.into();
    }

    let log_level = match config.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration validation error: {:#}", e);
            return EnumbersExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return EnumbersExitCode::ConfigError.into();
    }

    info!("Starting enumbersd daemon");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return EnumbersExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => EnumbersExitCode::CleanShutdown,
            Err(DaemonError::Startup(e)) => {
                error!("Startup failed: {:#}", e);
                EnumbersExitCode::ConfigError
            }
            Err(DaemonError::Runtime(e)) => {
                error!("Daemon error: {:#}", e);
                EnumbersExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Failure of `run_daemon`, split by exit code
enum DaemonError {
    /// Could not open storage, build the catalog or bind the listener
    Startup(anyhow::Error),
    /// Failed while serving
    Runtime(anyhow::Error),
}

/// Run the daemon
async fn run_daemon(config: Config) -> std::result::Result<(), DaemonError> {
    let service = config.service_config();

    let (reconciler, listener) = async {
        info!("Storage type: {}", service.storage.type_name());
        let document = storage::from_config(&service.storage).await?;
        let store = Arc::new(RecordStore::open(document).await?);

        let catalog = OpenFoodFactsCatalog::new(&service.catalog)?;
        debug!("Catalog client: {:?}", catalog);
        let reconciler = Arc::new(Reconciler::new(store, Arc::new(catalog)));

        let addr = config.socket_addr()?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        info!("Listening on {}", addr);

        Ok::<_, anyhow::Error>((reconciler, listener))
    }
    .await
    .map_err(DaemonError::Startup)?;

    let scheduler = if service.scheduler.enabled {
        let (scheduler, events) =
            ReconcileScheduler::new(Arc::clone(&reconciler), &service.scheduler)
                .map_err(|e| DaemonError::Startup(e.into()))?;
        tokio::spawn(log_scheduler_events(events));
        Some(scheduler.spawn())
    } else {
        info!("Background reconciliation disabled");
        None
    };

    let app = api::router(api::AppState::new(reconciler));
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            match wait_for_shutdown().await {
                Ok(signal) => info!("Received shutdown signal: {}", signal),
                Err(e) => error!("Signal handling failed, shutting down: {:#}", e),
            }
        })
        .await
        .context("HTTP server failed");

    if let Some(handle) = scheduler {
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle.shutdown()).await {
            Ok(Ok(())) => debug!("Scheduler stopped"),
            Ok(Err(e)) => warn!("Scheduler stopped with error: {}", e),
            Err(_) => warn!("Scheduler did not stop within {:?}", SHUTDOWN_TIMEOUT),
        }
    }

    served.map_err(DaemonError::Runtime)?;
    info!("Shutting down daemon");
    Ok(())
}

/// Forward scheduler events to the log until the channel closes
async fn log_scheduler_events(mut events: mpsc::Receiver<SchedulerEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SchedulerEvent::Started { interval } => {
                info!("Reconciliation scheduled every {:?}", interval)
            }
            SchedulerEvent::RunCompleted { report } => {
                if let Some(reason) = &report.fetch_error {
                    warn!("Scheduled reconciliation made no changes: {}", reason);
                } else {
                    info!("Scheduled reconciliation updated {} record(s)", report.updated);
                }
            }
            SchedulerEvent::RunFailed { error } => {
                error!("Scheduled reconciliation failed: {}", error)
            }
            SchedulerEvent::Stopped { reason } => info!("Scheduler stopped: {}", reason),
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
