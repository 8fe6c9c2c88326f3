use anyhow::Context;
use reqwest::{Client, Response};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{CredentialStore, JsonFileStore, TokenLifecycleManager};
use crate::error::ApiError;

/// Build the shared reqwest client used for IMS and platform calls
pub fn build_client(connect_timeout: u64, request_timeout: u64) -> anyhow::Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout))
        .timeout(Duration::from_secs(request_timeout))
        .build()
        .context("Failed to create HTTP client")
}

/// HTTP client for the platform API with retry logic
pub struct PlatformClient<S: CredentialStore = JsonFileStore> {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Source of validated tokens and request headers
    manager: Arc<TokenLifecycleManager<S>>,

    /// Maximum number of retries
    max_retries: u32,

    /// Base delay for exponential backoff (milliseconds)
    base_delay_ms: u64,
}

impl<S: CredentialStore> PlatformClient<S> {
    pub fn new(client: Client, manager: Arc<TokenLifecycleManager<S>>, max_retries: u32) -> Self {
        Self {
            client,
            manager,
            max_retries,
            base_delay_ms: 1000, // 1 second base delay
        }
    }

    /// Override the backoff base delay
    pub fn with_base_delay(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Authenticated GET against `base_url + path`, decoded as JSON
    pub async fn get_json(&self, path: &str, query: &[(String, String)]) -> Result<Value, ApiError> {
        let response = self.get_with_retry(path, query).await?;
        let body = response
            .json::<Value>()
            .await
            .context("Failed to decode platform response as JSON")?;
        Ok(body)
    }

    /// Execute a GET with retry logic
    /// Automatically handles:
    /// - 401: refreshes the token and retries once
    /// - 429: exponential backoff
    /// - 5xx: exponential backoff
    async fn get_with_retry(&self, path: &str, query: &[(String, String)]) -> Result<Response, ApiError> {
        let mut attempt = 0;
        let mut reauthenticated = false;

        loop {
            let (record, headers) = self.manager.authorized_request().await?;
            let url = format!("{}{}", record.base_url.trim_end_matches('/'), path);

            tracing::debug!(url = %url, attempt = attempt + 1, "Sending platform request");

            let result = self
                .client
                .get(&url)
                .headers(headers)
                .query(query)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        tracing::debug!(status = %status, "Request successful");
                        return Ok(response);
                    }

                    match status.as_u16() {
                        // 401: token revoked between validation and use
                        401 if !reauthenticated => {
                            tracing::warn!(url = %url, "Received 401, refreshing token and retrying once...");
                            reauthenticated = true;
                            self.manager.force_refresh().await?;
                            continue;
                        }

                        429 | 500..=599 if attempt < self.max_retries => {
                            let delay = self.calculate_backoff_delay(attempt);
                            tracing::warn!(
                                "Received {}, retrying after {}ms (attempt {}/{})",
                                status,
                                delay,
                                attempt + 1,
                                self.max_retries
                            );
                            tokio::time::sleep(Duration::from_millis(delay)).await;
                            attempt += 1;
                            continue;
                        }

                        _ => {}
                    }

                    let error_text = response.text().await.unwrap_or_default();
                    tracing::error!(
                        status = status.as_u16(),
                        url = %url,
                        response_body = %error_text,
                        attempt = attempt + 1,
                        "Platform request failed with error response"
                    );
                    return Err(ApiError::PlatformApiError {
                        status: status.as_u16(),
                        message: error_text,
                    });
                }

                Err(e) => {
                    let error_kind = if e.is_timeout() {
                        "timeout"
                    } else if e.is_connect() {
                        "connection_failed"
                    } else if e.is_request() {
                        "request_error"
                    } else {
                        "unknown"
                    };

                    if attempt < self.max_retries {
                        let delay = self.calculate_backoff_delay(attempt);
                        tracing::warn!(
                            error_kind = error_kind,
                            url = %url,
                            "Request failed: {}, retrying after {}ms (attempt {}/{})",
                            e,
                            delay,
                            attempt + 1,
                            self.max_retries
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        attempt += 1;
                        continue;
                    }

                    tracing::error!(
                        error_kind = error_kind,
                        error = %e,
                        url = %url,
                        total_attempts = attempt + 1,
                        "Platform request failed after all retries"
                    );
                    return Err(ApiError::Internal(anyhow::anyhow!(
                        "HTTP request failed: {} (kind: {})",
                        e,
                        error_kind
                    )));
                }
            }
        }
    }

    /// Calculate exponential backoff delay: base_delay * 2^attempt
    fn calculate_backoff_delay(&self, attempt: u32) -> u64 {
        self.base_delay_ms.saturating_mul(2_u64.saturating_pow(attempt))
    }
}
