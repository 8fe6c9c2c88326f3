// Authentication module
// Manages the credential record and access-token lifecycle

mod headers;
mod manager;
mod refresh;
mod store;
mod types;
mod validator;

pub use headers::{build_headers, API_KEY_HEADER, ORG_ID_HEADER, SANDBOX_HEADER};
pub use manager::TokenLifecycleManager;
pub use refresh::TokenRefresher;
pub use store::{import_credentials, CredentialStore, JsonFileStore};
pub use types::{
    CredentialRecord, PingOutcome, TokenState, TokenStatus, DEFAULT_IMS_URL, DEFAULT_SANDBOX,
    EXPIRING_SOON_SECS, REQUIRED_FIELDS, SANDBOX_FALLBACK_KEYS,
};
pub use validator::{is_expired, TokenValidator, PING_PATH};
