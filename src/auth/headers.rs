// Request headers shared by every authenticated platform call

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};

use super::types::CredentialRecord;
use crate::error::{Result, TokenError};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const ORG_ID_HEADER: &str = "x-gw-ims-org-id";
pub const SANDBOX_HEADER: &str = "x-sandbox-name";

/// Build the authentication headers for a platform request
pub fn build_headers(record: &CredentialRecord, token: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, header_value("Authorization", &format!("Bearer {}", token))?);
    headers.insert(
        HeaderName::from_static(API_KEY_HEADER),
        header_value(API_KEY_HEADER, &record.api_key)?,
    );
    headers.insert(
        HeaderName::from_static(ORG_ID_HEADER),
        header_value(ORG_ID_HEADER, &record.org_id)?,
    );
    headers.insert(
        HeaderName::from_static(SANDBOX_HEADER),
        header_value(SANDBOX_HEADER, record.sandbox())?,
    );
    Ok(headers)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(value).map_err(|_| {
        TokenError::ConfigError(format!("Value for header {} contains invalid characters", name))
    })?;
    if name == "Authorization" || name == API_KEY_HEADER {
        value.set_sensitive(true);
    }
    Ok(value)
}
