use std::time::Duration;

use cipherbatch_engine::{CryptoService, ExclusionOptions, MigrationOptions, OperationError};
use futures_util::future::BoxFuture;
use rand::Rng;
use serde_json::{json, Value};

// Re-export crates the benches need
pub use cipherbatch_engine;
pub use serde_json;

/// In-memory crypto service with a fixed per-call latency and an optional
/// failure rate, standing in for the remote API.
#[derive(Debug, Clone)]
pub struct SimulatedCryptoService {
    latency: Duration,
    failure_rate: f64,
}

impl SimulatedCryptoService {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            failure_rate: 0.0,
        }
    }

    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = failure_rate.clamp(0.0, 1.0);
        self
    }

    fn respond<'a>(
        &'a self,
        tag: &'static str,
        item: &'a Value,
    ) -> BoxFuture<'a, Result<Value, OperationError>> {
        Box::pin(async move {
            if self.latency.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.latency).await;
            }

            let fail = self.failure_rate > 0.0 && rand::thread_rng().gen_bool(self.failure_rate);
            if fail {
                return Err(OperationError::Remote {
                    status: 503,
                    message: "simulated outage".to_string(),
                });
            }
            Ok(json!({ tag: item.clone() }))
        })
    }
}

impl CryptoService for SimulatedCryptoService {
    fn encrypt<'a>(
        &'a self,
        item: &'a Value,
        _exclusions: Option<&'a ExclusionOptions>,
    ) -> BoxFuture<'a, Result<Value, OperationError>> {
        self.respond("ciphertext", item)
    }

    fn decrypt<'a>(
        &'a self,
        item: &'a Value,
        _exclusions: Option<&'a ExclusionOptions>,
    ) -> BoxFuture<'a, Result<Value, OperationError>> {
        self.respond("plaintext", item)
    }
}

/// `count` records shaped like typical customer rows.
pub fn sample_items(count: usize) -> Vec<Value> {
    (0..count)
        .map(|id| {
            json!({
                "id": id,
                "email": format!("user{id}@example.com"),
                "profile": { "ssn": format!("{:03}-{:02}-{:04}", id % 1000, id % 100, id % 10_000) }
            })
        })
        .collect()
}

/// Options with no inter-batch pause and a single attempt per item.
pub fn bench_options(batch_size: i64) -> MigrationOptions {
    MigrationOptions::new()
        .batch_size(batch_size)
        .delay_between_batches(Duration::ZERO)
        .max_retries(1)
}
