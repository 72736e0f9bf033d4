use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cipherbatch_engine::{Direction, MigrationProgress, MigrationResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub index: usize,
    pub item: Value,
    pub error: String,
    pub transient: bool,
}

/// JSON document written at the end of a migration job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    pub job_id: Uuid,
    pub direction: Direction,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: MigrationProgress,
    pub batches: usize,
    pub hook_failures: usize,
    pub cancelled: bool,
    pub successful: Vec<Value>,
    pub failed: Vec<FailureRecord>,
}

impl MigrationReport {
    pub fn new(
        job_id: Uuid,
        direction: Direction,
        started_at: DateTime<Utc>,
        result: MigrationResult,
    ) -> Self {
        let failed = result
            .failed
            .into_iter()
            .map(|failure| FailureRecord {
                index: failure.index,
                transient: failure.error.is_transient(),
                error: failure.error.to_string(),
                item: failure.original_item,
            })
            .collect();

        Self {
            job_id,
            direction,
            started_at,
            finished_at: Utc::now(),
            summary: result.summary,
            batches: result.batches,
            hook_failures: result.hook_failures,
            cancelled: result.cancelled,
            successful: result.successful,
            failed,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    /// Writes pretty JSON to `path`, or to stdout when no path is given.
    pub fn write(&self, path: Option<&Path>) -> Result<()> {
        let body = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        match path {
            Some(path) => fs::write(path, body)
                .with_context(|| format!("Failed to write report to {:?}", path)),
            None => {
                let mut stdout = io::stdout().lock();
                writeln!(stdout, "{body}").context("Failed to write report to stdout")
            }
        }
    }
}
