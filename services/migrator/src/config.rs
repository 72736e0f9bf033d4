use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use cipherbatch_engine::{
    Direction, MigrationOptions, MigrationSettings, DEFAULT_BATCH_SIZE,
    DEFAULT_DELAY_BETWEEN_BATCHES_MS, DEFAULT_MAX_RETRIES,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{DEFAULT_API_URL, DEFAULT_REQUEST_TIMEOUT_SECS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigratorConfig {
    /// Crypto API base URL
    pub api_url: String,

    /// Bearer token for the crypto API
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Whether items are encrypted or decrypted
    pub direction: Direction,

    /// Use the deep-encrypt/deep-decrypt endpoints
    pub deep: bool,

    /// Keep undecryptable fields instead of failing the item
    pub graceful_decrypt: bool,

    /// JSON file holding the array of items
    pub input_path: Option<PathBuf>,

    /// Where to write the report; stdout when unset
    pub output_path: Option<PathBuf>,

    /// Requested batch size, clamped by the engine
    pub batch_size: i64,

    /// Requested pause between batches, clamped by the engine
    pub delay_between_batches_ms: i64,

    /// Requested attempts per item, clamped by the engine
    pub max_retries: i64,

    /// Field-exclusion settings forwarded to the crypto API untouched
    pub exclusions: Option<Value>,

    /// Log level
    pub log_level: String,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            direction: Direction::Encrypt,
            deep: false,
            graceful_decrypt: false,
            input_path: None,
            output_path: None,
            batch_size: DEFAULT_BATCH_SIZE as i64,
            delay_between_batches_ms: DEFAULT_DELAY_BETWEEN_BATCHES_MS as i64,
            max_retries: i64::from(DEFAULT_MAX_RETRIES),
            exclusions: None,
            log_level: "info".to_string(),
        }
    }
}

impl MigratorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(url) = lookup("CRYPTO_API_URL") {
            cfg.api_url = url;
        }
        cfg.api_key = lookup("CRYPTO_API_KEY").filter(|key| !key.is_empty());
        if let Some(timeout) = lookup("CRYPTO_API_TIMEOUT_SECS") {
            cfg.request_timeout_secs = timeout
                .parse()
                .context("CRYPTO_API_TIMEOUT_SECS must be a positive integer")?;
        }
        if let Some(direction) = lookup("MIGRATION_DIRECTION") {
            cfg.direction = direction
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .context("Invalid MIGRATION_DIRECTION")?;
        }
        if let Some(flag) = lookup("MIGRATION_DEEP") {
            cfg.deep = parse_bool(&flag)
                .with_context(|| format!("MIGRATION_DEEP is invalid: {flag}"))?;
        }
        if let Some(flag) = lookup("MIGRATION_GRACEFUL_DECRYPT") {
            cfg.graceful_decrypt = parse_bool(&flag)
                .with_context(|| format!("MIGRATION_GRACEFUL_DECRYPT is invalid: {flag}"))?;
        }
        cfg.input_path = lookup("MIGRATION_INPUT")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);
        cfg.output_path = lookup("MIGRATION_OUTPUT")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);
        if let Some(size) = lookup("MIGRATION_BATCH_SIZE") {
            cfg.batch_size = size
                .parse()
                .context("MIGRATION_BATCH_SIZE must be an integer")?;
        }
        if let Some(delay) = lookup("MIGRATION_DELAY_MS") {
            cfg.delay_between_batches_ms = delay
                .parse()
                .context("MIGRATION_DELAY_MS must be an integer")?;
        }
        if let Some(retries) = lookup("MIGRATION_MAX_RETRIES") {
            cfg.max_retries = retries
                .parse()
                .context("MIGRATION_MAX_RETRIES must be an integer")?;
        }
        if let Some(raw) = lookup("MIGRATION_EXCLUSIONS").filter(|raw| !raw.trim().is_empty()) {
            let exclusions: Value =
                serde_json::from_str(&raw).context("MIGRATION_EXCLUSIONS must be valid JSON")?;
            cfg.exclusions = Some(exclusions);
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            cfg.log_level = level;
        }

        Ok(cfg)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_url.is_empty() {
            anyhow::bail!("CRYPTO_API_URL cannot be empty");
        }
        url::Url::parse(&self.api_url)
            .with_context(|| format!("CRYPTO_API_URL is not a valid URL: {}", self.api_url))?;

        if self.request_timeout_secs == 0 {
            anyhow::bail!("CRYPTO_API_TIMEOUT_SECS must be greater than 0");
        }

        match &self.input_path {
            None => anyhow::bail!("MIGRATION_INPUT is required"),
            Some(path) if !path.exists() => {
                anyhow::bail!("MIGRATION_INPUT file not found: {:?}", path)
            }
            Some(_) => {}
        }

        if let Some(exclusions) = &self.exclusions {
            if !exclusions.is_object() {
                anyhow::bail!("MIGRATION_EXCLUSIONS must be a JSON object");
            }
        }

        Ok(())
    }

    /// Engine options for this run, before hooks and cancellation are attached.
    pub fn migration_options(&self) -> MigrationOptions {
        MigrationOptions::from_settings(&MigrationSettings {
            batch_size: Some(self.batch_size),
            delay_between_batches: Some(self.delay_between_batches_ms),
            max_retries: Some(self.max_retries),
            exclusion_options: self.exclusions.clone(),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {other}"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;
    use tempfile::NamedTempFile;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let cfg = MigratorConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
        assert_eq!(cfg.direction, Direction::Encrypt);
        assert_eq!(cfg.batch_size, 10);
        assert_eq!(cfg.delay_between_batches_ms, 1_000);
        assert_eq!(cfg.max_retries, 3);
        assert!(cfg.api_key.is_none());
        assert!(cfg.input_path.is_none());
    }

    #[test]
    fn test_parses_migration_settings() {
        let cfg = MigratorConfig::from_vars(vars(&[
            ("CRYPTO_API_URL", "https://crypto.internal:8443/"),
            ("CRYPTO_API_KEY", "secret"),
            ("MIGRATION_DIRECTION", "decrypt"),
            ("MIGRATION_DEEP", "yes"),
            ("MIGRATION_BATCH_SIZE", "500"),
            ("MIGRATION_DELAY_MS", "-20"),
            ("MIGRATION_MAX_RETRIES", "0"),
            ("MIGRATION_EXCLUSIONS", r#"{"fields":["id"]}"#),
        ]))
        .unwrap();

        assert_eq!(cfg.direction, Direction::Decrypt);
        assert!(cfg.deep);
        assert_eq!(cfg.api_key.as_deref(), Some("secret"));
        assert_eq!(cfg.exclusions, Some(json!({"fields": ["id"]})));

        let options = cfg.migration_options();
        assert_eq!(options.get_batch_size(), 100);
        assert_eq!(options.get_delay_between_batches(), Duration::ZERO);
        assert_eq!(options.get_max_retries(), 1);
        assert_eq!(
            options.get_exclusion_options().unwrap().as_value(),
            &json!({"fields": ["id"]})
        );
    }

    #[test]
    fn test_rejects_malformed_values() {
        assert!(MigratorConfig::from_vars(vars(&[("MIGRATION_DIRECTION", "rotate")])).is_err());
        assert!(MigratorConfig::from_vars(vars(&[("MIGRATION_BATCH_SIZE", "ten")])).is_err());
        assert!(MigratorConfig::from_vars(vars(&[("MIGRATION_EXCLUSIONS", "{fields")])).is_err());
        assert!(MigratorConfig::from_vars(vars(&[("MIGRATION_DEEP", "maybe")])).is_err());
    }

    #[test]
    fn test_config_validation() {
        let input = NamedTempFile::new().unwrap();
        let mut config = MigratorConfig {
            input_path: Some(input.path().to_path_buf()),
            ..MigratorConfig::default()
        };

        // Valid configuration
        assert!(config.validate().is_ok());

        // Invalid: empty URL
        config.api_url = "".to_string();
        assert!(config.validate().is_err());
        config.api_url = "not a url".to_string();
        assert!(config.validate().is_err());
        config.api_url = DEFAULT_API_URL.to_string();

        // Invalid: zero timeout
        config.request_timeout_secs = 0;
        assert!(config.validate().is_err());
        config.request_timeout_secs = 30;

        // Invalid: exclusions must be an object
        config.exclusions = Some(json!(["id"]));
        assert!(config.validate().is_err());
        config.exclusions = None;

        // Invalid: missing input
        config.input_path = None;
        assert!(config.validate().is_err());
        config.input_path = Some(PathBuf::from("/definitely/not/here.json"));
        assert!(config.validate().is_err());
    }
}
