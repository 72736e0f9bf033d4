use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::operation::OperationError;

/// Running summary of a migration.
///
/// `processed == successful + failed` holds after every update, and
/// `percentage` is 100 exactly when every item has settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationProgress {
    pub total: usize,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub percentage: u8,
}

impl MigrationProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            successful: 0,
            failed: 0,
            percentage: completion_percentage(0, total),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.processed == self.total
    }
}

/// `round(processed / total * 100)`, held below 100 until the last item
/// settles. An empty run is complete.
pub fn completion_percentage(processed: usize, total: usize) -> u8 {
    if total == 0 || processed >= total {
        return 100;
    }
    let processed = processed as u128;
    let total = total as u128;
    let rounded = (processed * 200 + total) / (total * 2);
    rounded.min(99) as u8
}

/// An item that exhausted its retries.
#[derive(Debug, Clone)]
pub struct MigrationFailure {
    /// Position of the item in the submitted sequence.
    pub index: usize,
    pub original_item: Value,
    pub error: OperationError,
}

/// Terminal value of a migration run.
///
/// `successful` and `failed` are in completion order, which differs from
/// input order within a batch.
#[derive(Debug, Clone)]
pub struct MigrationResult {
    pub successful: Vec<Value>,
    pub failed: Vec<MigrationFailure>,
    pub summary: MigrationProgress,
    pub batches: usize,
    pub hook_failures: usize,
    pub cancelled: bool,
}

impl MigrationResult {
    pub fn empty() -> Self {
        Self {
            successful: Vec::new(),
            failed: Vec::new(),
            summary: MigrationProgress::new(0),
            batches: 0,
            hook_failures: 0,
            cancelled: false,
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}
