use std::time::{Duration, Instant};

use cipherbatch_engine::{CryptoService, ExclusionOptions, OperationError};
use futures_util::future::BoxFuture;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use super::types::{CryptoRequest, CryptoResponse, Endpoint, ErrorBody};
use super::CryptoApiError;
use crate::config::MigratorConfig;

/// HTTP client for the remote crypto API.
pub struct CryptoApiClient {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
    deep: bool,
    graceful_decrypt: bool,
}

impl CryptoApiClient {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .user_agent(concat!("cipherbatch-migrator/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .pool_max_idle_per_host(super::DEFAULT_POOL_IDLE_PER_HOST)
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            deep: false,
            graceful_decrypt: false,
        })
    }

    pub fn from_config(config: &MigratorConfig) -> anyhow::Result<Self> {
        Ok(Self::new(
            config.api_url.clone(),
            config.api_key.clone(),
            config.request_timeout(),
        )?
        .with_deep_operations(config.deep)
        .with_graceful_decrypt(config.graceful_decrypt))
    }

    /// Route item calls to the deep-encrypt/deep-decrypt endpoints.
    pub fn with_deep_operations(mut self, deep: bool) -> Self {
        self.deep = deep;
        self
    }

    pub fn with_graceful_decrypt(mut self, graceful: bool) -> Self {
        self.graceful_decrypt = graceful;
        self
    }

    pub async fn encrypt(
        &self,
        data: &Value,
        exclusions: Option<&ExclusionOptions>,
    ) -> Result<Value, CryptoApiError> {
        self.send(Endpoint::Encrypt, data, exclusions).await
    }

    pub async fn decrypt(
        &self,
        data: &Value,
        exclusions: Option<&ExclusionOptions>,
    ) -> Result<Value, CryptoApiError> {
        self.send(Endpoint::Decrypt, data, exclusions).await
    }

    pub async fn deep_encrypt(
        &self,
        data: &Value,
        exclusions: Option<&ExclusionOptions>,
    ) -> Result<Value, CryptoApiError> {
        self.send(Endpoint::DeepEncrypt, data, exclusions).await
    }

    pub async fn deep_decrypt(
        &self,
        data: &Value,
        exclusions: Option<&ExclusionOptions>,
    ) -> Result<Value, CryptoApiError> {
        self.send(Endpoint::DeepDecrypt, data, exclusions).await
    }

    #[instrument(skip(self, data, exclusions), fields(path = endpoint.path()))]
    async fn send(
        &self,
        endpoint: Endpoint,
        data: &Value,
        exclusions: Option<&ExclusionOptions>,
    ) -> Result<Value, CryptoApiError> {
        let url = format!("{}{}", self.base_url, endpoint.path());
        let request = CryptoRequest {
            data,
            exclusions: exclusions.map(ExclusionOptions::as_value),
            graceful: endpoint.is_decrypt() && self.graceful_decrypt,
        };

        let mut builder = self.http_client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let start = Instant::now();
        let response = builder.send().await?;
        let status = response.status();

        debug!(
            status = status.as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "crypto service responded"
        );

        if status.is_success() {
            let body: CryptoResponse = response.json().await.map_err(|e| {
                CryptoApiError::InvalidResponse(format!("Failed to parse crypto response: {}", e))
            })?;
            return Ok(body.data);
        }

        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error body".to_string());
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);

        Err(CryptoApiError::Service { status, message })
    }
}

impl CryptoService for CryptoApiClient {
    fn encrypt<'a>(
        &'a self,
        item: &'a Value,
        exclusions: Option<&'a ExclusionOptions>,
    ) -> BoxFuture<'a, Result<Value, OperationError>> {
        Box::pin(async move {
            let outcome = if self.deep {
                self.deep_encrypt(item, exclusions).await
            } else {
                CryptoApiClient::encrypt(self, item, exclusions).await
            };
            outcome.map_err(OperationError::from)
        })
    }

    fn decrypt<'a>(
        &'a self,
        item: &'a Value,
        exclusions: Option<&'a ExclusionOptions>,
    ) -> BoxFuture<'a, Result<Value, OperationError>> {
        Box::pin(async move {
            let outcome = if self.deep {
                self.deep_decrypt(item, exclusions).await
            } else {
                CryptoApiClient::decrypt(self, item, exclusions).await
            };
            outcome.map_err(OperationError::from)
        })
    }
}
