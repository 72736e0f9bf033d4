use anyhow::{Context, Result};
use cipherbatch_migrator::config::MigratorConfig;
use cipherbatch_migrator::job::run_job;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

const PARTIAL_FAILURE_EXIT_CODE: i32 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = MigratorConfig::from_env().context("Failed to load configuration")?;

    // Initialize tracing with the configured log level
    init_tracing(&config.log_level);

    info!("cipherbatch-migrate starting");
    info!(
        "Configuration loaded: api={}, direction={}, deep={}",
        config.api_url, config.direction, config.deep
    );

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        return Err(e);
    }

    // Stop at the next batch boundary on shutdown
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let report = run_job(&config, cancel).await?;
    report.write(config.output_path.as_deref())?;

    if report.cancelled {
        warn!(
            processed = report.summary.processed,
            total = report.summary.total,
            "migration stopped early"
        );
    }

    if report.has_failures() {
        error!(
            failed = report.summary.failed,
            total = report.summary.total,
            "migration finished with failed items"
        );
        std::process::exit(PARTIAL_FAILURE_EXIT_CODE);
    }

    info!("cipherbatch-migrate finished");
    Ok(())
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(true)
        .compact()
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received; finishing current batch");
}
