// Authentication types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sandbox used when the credential file does not name one
pub const DEFAULT_SANDBOX: &str = "prod";

/// IMS host used when the credential file does not name one
pub const DEFAULT_IMS_URL: &str = "https://ims-na1.adobelogin.com";

/// Remaining lifetime under which a token is reported as expiring soon
pub const EXPIRING_SOON_SECS: i64 = 900;

/// Older key spellings for the sandbox, read only when `sandbox` is absent
pub const SANDBOX_FALLBACK_KEYS: [&str; 2] = ["sandbox_id", "sandboxId"];

/// Fields that must be present and non-empty in every credential file
pub const REQUIRED_FIELDS: [&str; 5] = ["base_url", "api_key", "org_id", "client_id", "client_secret"];

/// Persisted configuration and secret material
///
/// Keys are snake_case only. Optional keys stay `Option` so that a file
/// which omits them is written back without them. Keys this type does not
/// know about, the sandbox fallback spellings included, are kept in `extra`
/// and survive a load/save cycle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CredentialRecord {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub org_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<String>,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ims_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Seconds since epoch; absent or 0 means never validated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expires_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CredentialRecord {
    /// `sandbox`, then the fallback keys, then the default
    pub fn sandbox(&self) -> &str {
        self.sandbox
            .as_deref()
            .or_else(|| {
                SANDBOX_FALLBACK_KEYS
                    .iter()
                    .find_map(|key| self.extra.get(*key).and_then(Value::as_str))
            })
            .unwrap_or(DEFAULT_SANDBOX)
    }

    pub fn ims_url(&self) -> &str {
        self.ims_url.as_deref().unwrap_or(DEFAULT_IMS_URL)
    }

    /// Scopes in the space-separated form the token endpoint expects
    pub fn scope_param(&self) -> String {
        self.scopes.as_deref().unwrap_or_default().join(" ")
    }

    pub fn expires_at(&self) -> i64 {
        self.token_expires_at.unwrap_or(0)
    }

    pub fn expires_at_datetime(&self) -> Option<DateTime<Utc>> {
        match self.expires_at() {
            0 => None,
            secs => DateTime::from_timestamp(secs, 0),
        }
    }

    /// Required fields that are absent or blank
    pub fn missing_fields(&self) -> Vec<&'static str> {
        REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| {
                let value = match *field {
                    "base_url" => &self.base_url,
                    "api_key" => &self.api_key,
                    "org_id" => &self.org_id,
                    "client_id" => &self.client_id,
                    _ => &self.client_secret,
                };
                value.trim().is_empty()
            })
            .collect()
    }

    /// Log-safe description of which credentials these are
    pub fn identity(&self) -> String {
        let client_prefix: String = self.client_id.chars().take(8).collect();
        format!(
            "org={} sandbox={} client={}...",
            self.org_id,
            self.sandbox(),
            client_prefix
        )
    }

    /// JSON view with secrets masked, for display
    pub fn redacted(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(obj) = value.as_object_mut() {
            for key in ["client_secret", "access_token", "api_key"] {
                if let Some(Value::String(secret)) = obj.get(key) {
                    let masked = mask_secret(secret);
                    obj.insert(key.to_string(), Value::String(masked));
                }
            }
        }
        value
    }

    /// Describe how long the stored token has left
    pub fn token_status(&self, now: i64) -> TokenStatus {
        if self.access_token.is_none() || self.expires_at() == 0 {
            return TokenStatus::Missing;
        }

        let remaining = self.expires_at() - now;
        if remaining <= 0 {
            TokenStatus::Expired
        } else if remaining <= EXPIRING_SOON_SECS {
            TokenStatus::ExpiringSoon {
                remaining: Duration::seconds(remaining),
            }
        } else {
            TokenStatus::Valid {
                remaining: Duration::seconds(remaining),
            }
        }
    }
}

fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}****", visible)
}

/// Result of the authenticated ping against the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingOutcome {
    Valid,
    Unauthorized,
    /// Network failure or a status that says nothing about the token
    Unreachable,
}

/// Lifecycle state of the in-memory credential record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Nothing loaded yet
    Unknown,
    /// Loaded or freshly refreshed, not yet confirmed remotely
    AssumedValid,
    /// Passed the expiry check and the remote ping
    ConfirmedValid,
    /// Rejected by the remote service or failed to refresh
    Invalid,
}

/// Expiry report for display
#[derive(Debug, Clone, PartialEq)]
pub enum TokenStatus {
    Missing,
    Expired,
    ExpiringSoon { remaining: Duration },
    Valid { remaining: Duration },
}

/// IMS token endpoint response
#[derive(Debug, Deserialize)]
pub struct OAuthTokenResponse {
    pub access_token: Option<String>,
    pub expires_in: Option<i64>,
}
