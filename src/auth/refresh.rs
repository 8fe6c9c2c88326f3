// Token refresh logic (IMS client-credentials grant)

use chrono::Utc;
use reqwest::Client;

use super::store::CredentialStore;
use super::types::{CredentialRecord, OAuthTokenResponse};
use crate::error::{Result, TokenError};

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_EXPIRES_IN: i64 = 86_400;

/// Get IMS token URL for a host
fn get_ims_token_url(ims_url: &str) -> String {
    format!("{}/ims/token/v2", ims_url.trim_end_matches('/'))
}

/// Exchanges client credentials for a new access token
#[derive(Clone)]
pub struct TokenRefresher {
    client: Client,
}

impl TokenRefresher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Request a new token, write it into a copy of `record` and persist it
    pub async fn refresh<S>(&self, record: &CredentialRecord, store: &S) -> Result<CredentialRecord>
    where
        S: CredentialStore + ?Sized,
    {
        tracing::info!("Refreshing access token ({})...", record.identity());

        if record.client_id.is_empty() || record.client_secret.is_empty() {
            return Err(TokenError::RefreshError(format!(
                "client_id and client_secret are required to refresh ({})",
                record.identity()
            )));
        }

        let url = get_ims_token_url(record.ims_url());
        let scope = record.scope_param();
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", record.client_id.as_str()),
            ("client_secret", record.client_secret.as_str()),
            ("scope", scope.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(url = %url, error = %e, "Token refresh request failed");
                TokenError::RefreshError(format!("Failed to reach {}: {}", url, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(
                url = %url,
                status = status.as_u16(),
                body = %error_text,
                "Token refresh failed ({})",
                record.identity()
            );

            // Try to parse IMS error for more details
            if let Ok(error_json) = serde_json::from_str::<serde_json::Value>(&error_text) {
                if let (Some(error_code), Some(error_desc)) = (
                    error_json.get("error").and_then(|v| v.as_str()),
                    error_json.get("error_description").and_then(|v| v.as_str()),
                ) {
                    tracing::error!(
                        "IMS error details: error={}, description={}",
                        error_code,
                        error_desc
                    );
                }
            }

            return Err(TokenError::RefreshError(format!(
                "{} returned {} - {}",
                url, status, error_text
            )));
        }

        let data: OAuthTokenResponse = response.json().await.map_err(|e| {
            TokenError::RefreshError(format!("Failed to parse response from {}: {}", url, e))
        })?;

        let access_token = data
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                TokenError::RefreshError(format!("Response from {} does not contain access_token", url))
            })?;

        let expires_in = data.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);
        if expires_in <= 0 {
            return Err(TokenError::RefreshError(format!(
                "Response from {} has non-positive expires_in: {}",
                url, expires_in
            )));
        }

        let mut updated = record.clone();
        updated.access_token = Some(access_token);
        updated.token_expires_at = Some(Utc::now().timestamp() + expires_in);

        store.save(&updated)?;

        tracing::info!(
            "Access token refreshed, expires: {}",
            updated
                .expires_at_datetime()
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_default()
        );

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        saved: Mutex<Option<CredentialRecord>>,
        saves: AtomicUsize,
    }

    impl CredentialStore for MemoryStore {
        fn load(&self) -> Result<CredentialRecord> {
            self.saved
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| TokenError::ConfigError("empty".into()))
        }

        fn save(&self, record: &CredentialRecord) -> Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            *self.saved.lock().unwrap() = Some(record.clone());
            Ok(())
        }

        fn location(&self) -> String {
            "memory".to_string()
        }
    }

    fn record(ims_url: &str) -> CredentialRecord {
        CredentialRecord {
            base_url: "https://platform.example.com".to_string(),
            api_key: "api-key".to_string(),
            org_id: "ORG@AdobeOrg".to_string(),
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            ims_url: Some(ims_url.to_string()),
            scopes: Some(vec!["openid".to_string(), "AdobeID".to_string()]),
            access_token: Some("T1".to_string()),
            token_expires_at: Some(Utc::now().timestamp() - 1),
            ..Default::default()
        }
    }

    #[test]
    fn test_get_ims_token_url() {
        assert_eq!(
            get_ims_token_url("https://ims-na1.adobelogin.com"),
            "https://ims-na1.adobelogin.com/ims/token/v2"
        );
        assert_eq!(
            get_ims_token_url("https://ims-na1.adobelogin.com/"),
            "https://ims-na1.adobelogin.com/ims/token/v2"
        );
    }

    #[tokio::test]
    async fn test_refresh_writes_token_and_expiry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/ims/token/v2")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                Matcher::UrlEncoded("client_id".into(), "client-id".into()),
                Matcher::UrlEncoded("client_secret".into(), "client-secret".into()),
                Matcher::UrlEncoded("scope".into(), "openid AdobeID".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"T2","token_type":"bearer","expires_in":3600}"#)
            .expect(1)
            .create_async()
            .await;

        let store = MemoryStore::default();
        let refresher = TokenRefresher::new(Client::new());
        let now = Utc::now().timestamp();
        let updated = refresher.refresh(&record(&server.url()), &store).await.unwrap();

        mock.assert_async().await;
        assert_eq!(updated.access_token.as_deref(), Some("T2"));
        assert!(updated.expires_at() >= now + 3599 && updated.expires_at() <= now + 3601);
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
        assert_eq!(store.load().unwrap(), updated);
    }

    #[tokio::test]
    async fn test_refresh_defaults_missing_expires_in() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/ims/token/v2")
            .with_status(200)
            .with_body(r#"{"access_token":"T2"}"#)
            .create_async()
            .await;

        let store = MemoryStore::default();
        let now = Utc::now().timestamp();
        let updated = TokenRefresher::new(Client::new())
            .refresh(&record(&server.url()), &store)
            .await
            .unwrap();
        assert!(updated.expires_at() >= now + DEFAULT_EXPIRES_IN - 1);
    }

    #[tokio::test]
    async fn test_refresh_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/ims/token/v2")
            .with_status(400)
            .with_body(r#"{"error":"invalid_client","error_description":"invalid client_secret"}"#)
            .create_async()
            .await;

        let store = MemoryStore::default();
        let err = TokenRefresher::new(Client::new())
            .refresh(&record(&server.url()), &store)
            .await
            .unwrap_err();

        match err {
            TokenError::RefreshError(msg) => assert!(msg.contains("400")),
            other => panic!("expected RefreshError, got {:?}", other),
        }
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refresh_missing_token_field() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/ims/token/v2")
            .with_status(200)
            .with_body(r#"{"expires_in":3600}"#)
            .create_async()
            .await;

        let store = MemoryStore::default();
        let err = TokenRefresher::new(Client::new())
            .refresh(&record(&server.url()), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::RefreshError(_)));
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refresh_rejects_non_positive_lifetime() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/ims/token/v2")
            .with_status(200)
            .with_body(r#"{"access_token":"T2","expires_in":0}"#)
            .create_async()
            .await;

        let store = MemoryStore::default();
        let err = TokenRefresher::new(Client::new())
            .refresh(&record(&server.url()), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::RefreshError(_)));
    }

    #[tokio::test]
    async fn test_refresh_requires_client_credentials() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/ims/token/v2").expect(0).create_async().await;

        let mut incomplete = record(&server.url());
        incomplete.client_secret.clear();

        let store = MemoryStore::default();
        let err = TokenRefresher::new(Client::new())
            .refresh(&incomplete, &store)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::RefreshError(_)));
        mock.assert_async().await;
    }
}
