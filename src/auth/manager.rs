use chrono::Utc;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::path::PathBuf;
use tokio::sync::Mutex;

use super::headers::build_headers;
use super::refresh::TokenRefresher;
use super::store::{CredentialStore, JsonFileStore};
use super::types::{CredentialRecord, PingOutcome, TokenState};
use super::validator::{self, TokenValidator};
use crate::error::{Result, TokenError};

/// Record and state guarded together so refresh-and-save is a critical section
struct Inner {
    state: TokenState,
    record: Option<CredentialRecord>,
}

/// Token lifecycle manager
/// Owns the credential record and hands out validated access tokens
pub struct TokenLifecycleManager<S: CredentialStore = JsonFileStore> {
    /// Where the record is loaded from and refreshed tokens are written to
    store: S,

    /// Remote ping against the platform
    validator: TokenValidator,

    /// IMS client-credentials exchange
    refresher: TokenRefresher,

    /// Held for the whole of a token request
    inner: Mutex<Inner>,
}

impl TokenLifecycleManager<JsonFileStore> {
    /// Create a manager over a JSON credential file
    pub fn from_path(path: PathBuf, client: Client) -> Self {
        tracing::info!("Using credentials file: {}", path.display());
        Self::new(JsonFileStore::new(path), client)
    }
}

impl<S: CredentialStore> TokenLifecycleManager<S> {
    /// Create a manager; nothing is read until the first token request
    pub fn new(store: S, client: Client) -> Self {
        Self {
            store,
            validator: TokenValidator::new(client.clone()),
            refresher: TokenRefresher::new(client),
            inner: Mutex::new(Inner {
                state: TokenState::Unknown,
                record: None,
            }),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn state(&self) -> TokenState {
        self.inner.lock().await.state
    }

    /// Get a validated access token, refreshing if expired or rejected
    pub async fn get_access_token(&self) -> Result<String> {
        let (_, token) = self.validated().await?;
        Ok(token)
    }

    /// Headers for a platform call, built around a freshly validated token
    pub async fn authorized_headers(&self) -> Result<HeaderMap> {
        let (_, headers) = self.authorized_request().await?;
        Ok(headers)
    }

    /// Validated record and its request headers, taken under one lock
    pub async fn authorized_request(&self) -> Result<(CredentialRecord, HeaderMap)> {
        let (record, token) = self.validated().await?;
        let headers = build_headers(&record, &token)?;
        Ok((record, headers))
    }

    /// Refresh unconditionally, then confirm the new token remotely
    pub async fn force_refresh(&self) -> Result<String> {
        let mut inner = self.inner.lock().await;
        self.ensure_loaded(&mut inner)?;
        self.refresh_locked(&mut inner).await?;
        let (_, token) = self.confirm_locked(&mut inner, false).await?;
        Ok(token)
    }

    /// Snapshot of the current record, loading it on first use
    pub async fn record(&self) -> Result<CredentialRecord> {
        let mut inner = self.inner.lock().await;
        self.ensure_loaded(&mut inner).cloned()
    }

    /// Drop the in-memory record so the next request re-reads storage
    pub async fn invalidate(&self) {
        let mut inner = self.inner.lock().await;
        inner.record = None;
        inner.state = TokenState::Unknown;
        tracing::debug!("Credential record invalidated, will reload from {}", self.store.location());
    }

    async fn validated(&self) -> Result<(CredentialRecord, String)> {
        let mut inner = self.inner.lock().await;

        let record = self.ensure_loaded(&mut inner)?;
        if validator::is_expired(record, Utc::now().timestamp()) {
            tracing::warn!("Token expired or missing, attempting refresh ({})", record.identity());
            self.refresh_locked(&mut inner).await?;
        }

        self.confirm_locked(&mut inner, true).await
    }

    fn ensure_loaded<'a>(&self, inner: &'a mut Inner) -> Result<&'a CredentialRecord> {
        if inner.record.is_none() {
            let record = self.store.load()?;
            inner.record = Some(record);
            inner.state = TokenState::AssumedValid;
        }

        inner
            .record
            .as_ref()
            .ok_or_else(|| TokenError::ConfigError("Credential record not loaded".to_string()))
    }

    async fn refresh_locked(&self, inner: &mut Inner) -> Result<()> {
        let current = inner
            .record
            .as_ref()
            .ok_or_else(|| TokenError::ConfigError("Credential record not loaded".to_string()))?;

        let result = self.refresher.refresh(current, &self.store).await;
        match result {
            Ok(updated) => {
                inner.record = Some(updated);
                inner.state = TokenState::AssumedValid;
                Ok(())
            }
            Err(e) => {
                tracing::error!("Token refresh failed: {}", e);
                inner.state = TokenState::Invalid;
                Err(e)
            }
        }
    }

    /// Ping with the current token; a 401 earns at most one refresh
    async fn confirm_locked(
        &self,
        inner: &mut Inner,
        mut refresh_on_unauthorized: bool,
    ) -> Result<(CredentialRecord, String)> {
        loop {
            let record = inner
                .record
                .as_ref()
                .ok_or_else(|| TokenError::ConfigError("Credential record not loaded".to_string()))?;

            match self.validator.ping_remote(record).await? {
                PingOutcome::Valid => {
                    let token = record.access_token.clone().ok_or_else(|| {
                        TokenError::AuthError(format!("No access token available ({})", record.identity()))
                    })?;
                    let record = record.clone();
                    inner.state = TokenState::ConfirmedValid;
                    return Ok((record, token));
                }
                PingOutcome::Unauthorized if refresh_on_unauthorized => {
                    refresh_on_unauthorized = false;
                    inner.state = TokenState::Invalid;
                    tracing::warn!("Token invalid, refreshing and validating once more");
                    self.refresh_locked(inner).await?;
                }
                PingOutcome::Unauthorized => {
                    let identity = record.identity();
                    inner.state = TokenState::Invalid;
                    tracing::error!("Token still rejected after refresh ({})", identity);
                    return Err(TokenError::AuthError(format!(
                        "Platform rejected the token after refresh; check client credentials ({})",
                        identity
                    )));
                }
                PingOutcome::Unreachable => {
                    let identity = record.identity();
                    tracing::error!("Could not confirm token with {} ({})", record.base_url, identity);
                    return Err(TokenError::TransientError(format!(
                        "Could not confirm token with {} ({})",
                        record.base_url, identity
                    )));
                }
            }
        }
    }
}
