use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::callbacks::{ErrorHook, ProgressHook};
use crate::error::MigrationError;
use crate::operation::{ExclusionOptions, OperationError};
use crate::progress::MigrationProgress;
use crate::{
    DEFAULT_BATCH_SIZE, DEFAULT_DELAY_BETWEEN_BATCHES_MS, DEFAULT_MAX_RETRIES, MAX_BATCH_SIZE,
    MAX_RETRIES_LIMIT,
};

/// Numeric settings as a caller might supply them in JSON or env.
///
/// Out-of-range values are clamped when converted, never rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MigrationSettings {
    pub batch_size: Option<i64>,
    pub delay_between_batches: Option<i64>,
    pub max_retries: Option<i64>,
    pub exclusion_options: Option<Value>,
}

/// Tuning and observers for one migration run.
#[derive(Clone)]
pub struct MigrationOptions {
    batch_size: usize,
    delay_between_batches: Duration,
    max_retries: u32,
    on_progress: Option<ProgressHook>,
    on_error: Option<ErrorHook>,
    exclusion_options: Option<ExclusionOptions>,
    cancellation: Option<CancellationToken>,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            delay_between_batches: Duration::from_millis(DEFAULT_DELAY_BETWEEN_BATCHES_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            on_progress: None,
            on_error: None,
            exclusion_options: None,
            cancellation: None,
        }
    }
}

impl fmt::Debug for MigrationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationOptions")
            .field("batch_size", &self.batch_size)
            .field("delay_between_batches", &self.delay_between_batches)
            .field("max_retries", &self.max_retries)
            .field("on_progress", &self.on_progress.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("exclusion_options", &self.exclusion_options)
            .field("cancellable", &self.cancellation.is_some())
            .finish()
    }
}

impl MigrationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds options from a JSON object such as
    /// `{"batchSize": 25, "delayBetweenBatches": 500, "maxRetries": 5}`.
    pub fn from_json(value: Value) -> Result<Self, MigrationError> {
        if !value.is_object() {
            return Err(MigrationError::InvalidOptions(format!(
                "expected a JSON object, got {}",
                json_kind(&value)
            )));
        }
        let settings: MigrationSettings = serde_json::from_value(value)
            .map_err(|e| MigrationError::InvalidOptions(e.to_string()))?;
        Ok(Self::from_settings(&settings))
    }

    pub fn from_settings(settings: &MigrationSettings) -> Self {
        let mut options = Self::default();
        if let Some(size) = settings.batch_size {
            options = options.batch_size(size);
        }
        if let Some(delay) = settings.delay_between_batches {
            options = options.delay_between_batches_ms(delay);
        }
        if let Some(retries) = settings.max_retries {
            options = options.max_retries(retries);
        }
        if let Some(exclusions) = &settings.exclusion_options {
            options = options.exclusion_options(ExclusionOptions::new(exclusions.clone()));
        }
        options
    }

    /// Clamped to `[1, 100]`.
    pub fn batch_size(mut self, size: i64) -> Self {
        self.batch_size = size.clamp(1, MAX_BATCH_SIZE as i64) as usize;
        self
    }

    /// Negative values become zero.
    pub fn delay_between_batches_ms(mut self, delay_ms: i64) -> Self {
        self.delay_between_batches = Duration::from_millis(delay_ms.max(0) as u64);
        self
    }

    pub fn delay_between_batches(mut self, delay: Duration) -> Self {
        self.delay_between_batches = delay;
        self
    }

    /// Clamped to `[1, 10]`.
    pub fn max_retries(mut self, retries: i64) -> Self {
        self.max_retries = retries.clamp(1, i64::from(MAX_RETRIES_LIMIT)) as u32;
        self
    }

    pub fn on_progress<F>(mut self, hook: F) -> Self
    where
        F: Fn(&MigrationProgress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(hook));
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&OperationError, &Value) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub fn exclusion_options(mut self, exclusions: ExclusionOptions) -> Self {
        self.exclusion_options = Some(exclusions);
        self
    }

    /// Checked only between batches; a dispatched batch always settles.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn get_batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn get_delay_between_batches(&self) -> Duration {
        self.delay_between_batches
    }

    pub fn get_max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn get_exclusion_options(&self) -> Option<&ExclusionOptions> {
        self.exclusion_options.as_ref()
    }

    pub(crate) fn progress_hook(&self) -> Option<ProgressHook> {
        self.on_progress.clone()
    }

    pub(crate) fn error_hook(&self) -> Option<ErrorHook> {
        self.on_error.clone()
    }

    pub(crate) fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_defaults() {
        let options = MigrationOptions::default();
        assert_eq!(options.get_batch_size(), 10);
        assert_eq!(options.get_delay_between_batches(), Duration::from_millis(1_000));
        assert_eq!(options.get_max_retries(), 3);
        assert!(options.get_exclusion_options().is_none());
    }

    #[test]
    fn test_batch_size_is_clamped() {
        assert_eq!(MigrationOptions::new().batch_size(0).get_batch_size(), 1);
        assert_eq!(MigrationOptions::new().batch_size(-7).get_batch_size(), 1);
        assert_eq!(MigrationOptions::new().batch_size(500).get_batch_size(), 100);
        assert_eq!(MigrationOptions::new().batch_size(42).get_batch_size(), 42);
    }

    #[test]
    fn test_retries_and_delay_are_clamped() {
        assert_eq!(MigrationOptions::new().max_retries(0).get_max_retries(), 1);
        assert_eq!(MigrationOptions::new().max_retries(99).get_max_retries(), 10);
        assert_eq!(
            MigrationOptions::new()
                .delay_between_batches_ms(-250)
                .get_delay_between_batches(),
            Duration::ZERO
        );
    }

    #[test]
    fn test_from_json() {
        let options = MigrationOptions::from_json(json!({
            "batchSize": 500,
            "delayBetweenBatches": 250,
            "maxRetries": -1,
            "exclusionOptions": { "fields": ["id", "createdAt"] }
        }))
        .unwrap();

        assert_eq!(options.get_batch_size(), 100);
        assert_eq!(options.get_delay_between_batches(), Duration::from_millis(250));
        assert_eq!(options.get_max_retries(), 1);
        assert_eq!(
            options.get_exclusion_options().unwrap().as_value(),
            &json!({ "fields": ["id", "createdAt"] })
        );
    }

    #[test]
    fn test_from_json_rejects_malformed_options() {
        assert!(matches!(
            MigrationOptions::from_json(json!([1, 2])),
            Err(MigrationError::InvalidOptions(_))
        ));
        assert!(matches!(
            MigrationOptions::from_json(json!({ "batchSize": "ten" })),
            Err(MigrationError::InvalidOptions(_))
        ));
        assert!(matches!(
            MigrationOptions::from_json(json!({ "batchSzie": 10 })),
            Err(MigrationError::InvalidOptions(_))
        ));
    }
}
