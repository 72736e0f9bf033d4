use thiserror::Error;

/// Pre-flight failures. These are the only errors a migration run returns to
/// its caller; per-item failures are collected into the result instead.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("invalid migration input: {0}")]
    InvalidInput(String),

    #[error("invalid migration options: {0}")]
    InvalidOptions(String),
}
