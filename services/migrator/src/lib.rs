pub mod client;
pub mod config;
pub mod job;
pub mod report;

pub use client::{CryptoApiClient, CryptoApiError};
pub use config::MigratorConfig;
pub use job::{load_items, run_job};
pub use report::{FailureRecord, MigrationReport};
