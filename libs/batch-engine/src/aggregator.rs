//! Folds settled item outcomes into the run's summary.
//!
//! The aggregator is owned by the scheduler's task and mutated through
//! `&mut self`. Every item future of a batch is polled on that same task, so
//! settlements are recorded one at a time and no lock is needed; moving item
//! processing onto spawned tasks would require wrapping this in a mutex.

use serde_json::Value;

use crate::operation::OperationError;
use crate::progress::{completion_percentage, MigrationFailure, MigrationProgress, MigrationResult};

#[derive(Debug)]
pub struct ResultAggregator {
    progress: MigrationProgress,
    successful: Vec<Value>,
    failed: Vec<MigrationFailure>,
}

impl ResultAggregator {
    pub fn new(total: usize) -> Self {
        Self {
            progress: MigrationProgress::new(total),
            successful: Vec::with_capacity(total),
            failed: Vec::new(),
        }
    }

    pub fn progress(&self) -> MigrationProgress {
        self.progress
    }

    pub fn record_success(&mut self, value: Value) -> MigrationProgress {
        self.progress.successful += 1;
        self.successful.push(value);
        self.advance()
    }

    pub fn record_failure(
        &mut self,
        index: usize,
        original_item: Value,
        error: OperationError,
    ) -> (MigrationProgress, &MigrationFailure) {
        self.progress.failed += 1;
        self.failed.push(MigrationFailure {
            index,
            original_item,
            error,
        });
        let snapshot = self.advance();
        let failure = self
            .failed
            .last()
            .expect("failure was pushed immediately above");
        (snapshot, failure)
    }

    pub fn finish(self, batches: usize, hook_failures: usize, cancelled: bool) -> MigrationResult {
        MigrationResult {
            successful: self.successful,
            failed: self.failed,
            summary: self.progress,
            batches,
            hook_failures,
            cancelled,
        }
    }

    fn advance(&mut self) -> MigrationProgress {
        self.progress.processed += 1;
        debug_assert_eq!(
            self.progress.processed,
            self.progress.successful + self.progress.failed
        );
        self.progress.percentage =
            completion_percentage(self.progress.processed, self.progress.total);
        self.progress
    }
}
