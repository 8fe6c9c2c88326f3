// Token validation: local expiry check and remote ping

use reqwest::{Client, StatusCode};

use super::headers::build_headers;
use super::types::{CredentialRecord, PingOutcome};
use crate::error::Result;

/// Lightweight authenticated endpoint used to confirm a token
pub const PING_PATH: &str = "/data/core/ups/config/mergePolicies";

/// Check whether the stored token can no longer be used at `now`
pub fn is_expired(record: &CredentialRecord, now: i64) -> bool {
    record.access_token.is_none() || now >= record.expires_at()
}

/// Confirms tokens against the platform without mutating anything
#[derive(Clone)]
pub struct TokenValidator {
    client: Client,
}

impl TokenValidator {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn ping_url(record: &CredentialRecord) -> String {
        format!("{}{}", record.base_url.trim_end_matches('/'), PING_PATH)
    }

    /// Send one authenticated request with the current token
    ///
    /// Only header construction can fail; network trouble maps to
    /// [`PingOutcome::Unreachable`].
    pub async fn ping_remote(&self, record: &CredentialRecord) -> Result<PingOutcome> {
        let Some(token) = record.access_token.as_deref() else {
            tracing::warn!("No access token to validate ({})", record.identity());
            return Ok(PingOutcome::Unauthorized);
        };

        let url = Self::ping_url(record);
        let headers = build_headers(record, token)?;

        let response = match self.client.get(&url).headers(headers).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    url = %url,
                    error = %e,
                    "Token validation request failed ({})",
                    record.identity()
                );
                return Ok(PingOutcome::Unreachable);
            }
        };

        let status = response.status();
        let outcome = match status {
            StatusCode::OK => {
                tracing::info!("Token validated successfully with API");
                PingOutcome::Valid
            }
            StatusCode::UNAUTHORIZED => {
                tracing::warn!(url = %url, "Token rejected by API ({})", record.identity());
                PingOutcome::Unauthorized
            }
            _ => {
                tracing::warn!(
                    url = %url,
                    status = status.as_u16(),
                    "Unexpected token check status ({})",
                    record.identity()
                );
                PingOutcome::Unreachable
            }
        };

        Ok(outcome)
    }
}
