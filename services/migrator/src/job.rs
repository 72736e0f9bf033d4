use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use cipherbatch_engine::{items_from_json, MigrationProgress, Migrator};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::client::CryptoApiClient;
use crate::config::MigratorConfig;
use crate::report::MigrationReport;

/// Reads a JSON array of items from `path`.
pub fn load_items(path: &Path) -> Result<Vec<Value>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read migration input {:?}", path))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Migration input {:?} is not valid JSON", path))?;
    Ok(items_from_json(value)?)
}

/// Runs one migration job end to end: load the input, drive the engine
/// against the configured crypto API, and build the report.
pub async fn run_job(
    config: &MigratorConfig,
    cancel: CancellationToken,
) -> Result<MigrationReport> {
    let job_id = Uuid::new_v4();
    let span = info_span!("migration_job", %job_id, direction = %config.direction);

    async move {
        let input = config
            .input_path
            .as_deref()
            .context("MIGRATION_INPUT is required")?;
        let items = load_items(input)?;
        info!(items = items.len(), input = ?input, "loaded migration input");

        let client =
            CryptoApiClient::from_config(config).context("Failed to build crypto API client")?;
        let migrator = Migrator::new(client);

        let options = config
            .migration_options()
            .cancellation_token(cancel)
            .on_progress(log_progress);

        let started_at = Utc::now();
        let result = migrator.run(config.direction, items, options).await;

        Ok::<_, anyhow::Error>(MigrationReport::new(
            job_id,
            config.direction,
            started_at,
            result,
        ))
    }
    .instrument(span)
    .await
}

fn log_progress(progress: &MigrationProgress) {
    info!(
        processed = progress.processed,
        total = progress.total,
        successful = progress.successful,
        failed = progress.failed,
        percentage = progress.percentage,
        "migration progress"
    );
}
