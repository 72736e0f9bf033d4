//! Batch migration engine for remote encrypt/decrypt services.
//!
//! Items are partitioned into fixed-size batches. Every item of a batch is
//! dispatched concurrently through a retrying item processor, the outcomes are
//! folded into a running progress summary, observer hooks are notified after
//! each settled item, and the scheduler pauses between batches to stay under
//! the remote service's rate limits. Per-item failures never abort a run; they
//! are collected into the final [`MigrationResult`].

pub mod aggregator;
pub mod callbacks;
pub mod error;
pub mod operation;
pub mod options;
pub mod progress;
pub mod retry;
pub mod scheduler;

pub use aggregator::ResultAggregator;
pub use callbacks::{ErrorHook, ProgressHook};
pub use error::MigrationError;
pub use operation::{CryptoService, Direction, ExclusionOptions, OperationError};
pub use options::{MigrationOptions, MigrationSettings};
pub use progress::{MigrationFailure, MigrationProgress, MigrationResult};
pub use retry::{process_with_retry, retry_with_backoff, RetryPolicy, Sleeper, TokioSleeper};
pub use scheduler::{items_from_json, Migrator};

/// Default number of items dispatched concurrently per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;
/// Upper bound applied to any requested batch size.
pub const MAX_BATCH_SIZE: usize = 100;
/// Default pause between batches, in milliseconds.
pub const DEFAULT_DELAY_BETWEEN_BATCHES_MS: u64 = 1_000;
/// Default attempts per item, including the first call.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Upper bound applied to any requested retry count.
pub const MAX_RETRIES_LIMIT: u32 = 10;
