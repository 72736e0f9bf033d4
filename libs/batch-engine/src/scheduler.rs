use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::aggregator::ResultAggregator;
use crate::callbacks::CallbackDispatch;
use crate::error::MigrationError;
use crate::operation::{CryptoService, Direction, ExclusionOptions};
use crate::options::{json_kind, MigrationOptions};
use crate::progress::MigrationResult;
use crate::retry::{process_with_retry, RetryPolicy, Sleeper, TokioSleeper};

/// Accepts only a JSON array of items.
pub fn items_from_json(value: Value) -> Result<Vec<Value>, MigrationError> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(MigrationError::InvalidInput(format!(
            "expected a JSON array of items, got {}",
            json_kind(&other)
        ))),
    }
}

/// Drives batched encrypt/decrypt migrations against a [`CryptoService`].
pub struct Migrator<S> {
    service: S,
    sleeper: Arc<dyn Sleeper>,
}

impl<S: CryptoService> Migrator<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replaces the timer used for inter-batch delays and retry backoff.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub async fn run_encrypt_migration(
        &self,
        items: Vec<Value>,
        options: MigrationOptions,
    ) -> MigrationResult {
        self.run(Direction::Encrypt, items, options).await
    }

    pub async fn run_decrypt_migration(
        &self,
        items: Vec<Value>,
        options: MigrationOptions,
    ) -> MigrationResult {
        self.run(Direction::Decrypt, items, options).await
    }

    /// Processes `items` in consecutive batches of `options.batch_size`.
    ///
    /// All items of a batch are in flight together and the batch must settle
    /// completely before the inter-batch delay starts. There is no delay after
    /// the final batch. Item failures are collected, never returned as errors.
    #[instrument(
        skip_all,
        fields(run_id = %Uuid::new_v4(), direction = %direction, total = items.len())
    )]
    pub async fn run(
        &self,
        direction: Direction,
        items: Vec<Value>,
        options: MigrationOptions,
    ) -> MigrationResult {
        let total = items.len();
        if total == 0 {
            info!("no items submitted; nothing to migrate");
            return MigrationResult::empty();
        }

        let batch_size = options.get_batch_size();
        let delay = options.get_delay_between_batches();
        let policy = RetryPolicy::new(i64::from(options.get_max_retries()));
        let exclusions = options.get_exclusion_options();
        let cancellation = options.cancellation();
        let batch_count = total.div_ceil(batch_size);

        info!(
            batch_size,
            batch_count,
            max_attempts = policy.max_attempts(),
            delay_ms = delay.as_millis() as u64,
            "starting migration"
        );

        let mut aggregator = ResultAggregator::new(total);
        let mut dispatch = CallbackDispatch::new(options.progress_hook(), options.error_hook());
        let mut pending = items.into_iter().enumerate();
        let mut batches = 0usize;
        let mut cancelled = false;

        for batch_number in 1..=batch_count {
            if cancellation.is_some_and(CancellationToken::is_cancelled) {
                cancelled = true;
                break;
            }

            let batch: Vec<(usize, Value)> = pending.by_ref().take(batch_size).collect();
            let batch_len = batch.len();
            batches += 1;

            self.run_batch(
                direction,
                batch,
                &policy,
                exclusions,
                &mut aggregator,
                &mut dispatch,
            )
            .await;

            let progress = aggregator.progress();
            info!(
                batch = batch_number,
                batch_count,
                batch_len,
                processed = progress.processed,
                failed = progress.failed,
                percentage = progress.percentage,
                "batch settled"
            );

            if batch_number < batch_count && !self.pause(delay, cancellation).await {
                cancelled = true;
                break;
            }
        }

        let result = aggregator.finish(batches, dispatch.faults(), cancelled);
        if cancelled {
            warn!(
                processed = result.summary.processed,
                total,
                "migration cancelled at batch boundary"
            );
        }
        info!(
            successful = result.summary.successful,
            failed = result.summary.failed,
            batches = result.batches,
            hook_failures = result.hook_failures,
            "migration finished"
        );
        result
    }

    async fn run_batch(
        &self,
        direction: Direction,
        batch: Vec<(usize, Value)>,
        policy: &RetryPolicy,
        exclusions: Option<&ExclusionOptions>,
        aggregator: &mut ResultAggregator,
        dispatch: &mut CallbackDispatch,
    ) {
        let service: &dyn CryptoService = &self.service;
        let sleeper: &dyn Sleeper = self.sleeper.as_ref();

        let mut in_flight: FuturesUnordered<_> = batch
            .into_iter()
            .map(move |(index, item)| async move {
                let outcome =
                    process_with_retry(service, direction, &item, policy, exclusions, sleeper)
                        .await;
                (index, item, outcome)
            })
            .collect();

        while let Some((index, item, outcome)) = in_flight.next().await {
            match outcome {
                Ok(value) => {
                    let snapshot = aggregator.record_success(value);
                    dispatch.progress(&snapshot);
                }
                Err(error) => {
                    warn!(index, error = %error, "item failed after exhausting retries");
                    let (snapshot, failure) = aggregator.record_failure(index, item, error);
                    dispatch.progress(&snapshot);
                    dispatch.error(&failure.error, &failure.original_item);
                }
            }
        }
    }

    /// Returns `false` when cancellation interrupted the wait.
    async fn pause(&self, delay: Duration, cancellation: Option<&CancellationToken>) -> bool {
        match cancellation {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => false,
                    _ = self.sleeper.sleep(delay) => true,
                }
            }
            None => {
                self.sleeper.sleep(delay).await;
                true
            }
        }
    }
}
