// Credential storage backed by a JSON file

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::types::CredentialRecord;
use crate::error::{Result, TokenError};

/// Durable read/write of the credential record
pub trait CredentialStore: Send + Sync {
    /// Read and validate the record
    fn load(&self) -> Result<CredentialRecord>;

    /// Replace the stored record
    fn save(&self, record: &CredentialRecord) -> Result<()>;

    /// Human-readable location, used in log lines
    fn location(&self) -> String;
}

/// Credential record kept as a pretty-printed JSON object on disk
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the file without checking for required fields
    pub fn read_record(&self) -> Result<CredentialRecord> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            let reason = if e.kind() == ErrorKind::NotFound {
                "file not found".to_string()
            } else {
                e.to_string()
            };
            tracing::error!(path = %self.path.display(), "Failed to read credentials: {}", reason);
            TokenError::ConfigError(format!(
                "Failed to read credentials file {}: {}",
                self.path.display(),
                reason
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            tracing::error!(path = %self.path.display(), "Malformed credentials file: {}", e);
            TokenError::ConfigError(format!(
                "Failed to parse credentials file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Sibling path the record is staged at before the rename
    fn staging_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "credentials.json".to_string());
        self.path.with_file_name(format!(".{}.tmp", file_name))
    }

    fn write_config_error(&self, e: std::io::Error) -> TokenError {
        tracing::error!(path = %self.path.display(), "Failed to write credentials: {}", e);
        TokenError::ConfigError(format!(
            "Failed to write credentials file {}: {}",
            self.path.display(),
            e
        ))
    }
}

impl CredentialStore for JsonFileStore {
    fn load(&self) -> Result<CredentialRecord> {
        let record = self.read_record()?;

        let missing = record.missing_fields();
        if !missing.is_empty() {
            tracing::error!(
                path = %self.path.display(),
                "Credentials file is missing required fields: {}",
                missing.join(", ")
            );
            return Err(TokenError::ConfigError(format!(
                "Credentials file {} is missing required fields: {}",
                self.path.display(),
                missing.join(", ")
            )));
        }

        tracing::debug!(path = %self.path.display(), "Loaded credentials ({})", record.identity());
        Ok(record)
    }

    fn save(&self, record: &CredentialRecord) -> Result<()> {
        let json = serde_json::to_string_pretty(record).map_err(|e| {
            TokenError::ConfigError(format!("Failed to serialize credentials: {}", e))
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.write_config_error(e))?;
        }

        // Readers only ever see the old file or the complete new one
        let staging = self.staging_path();
        let write_result = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&staging)?;
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
            fs::rename(&staging, &self.path)
        })();

        if let Err(e) = write_result {
            let _ = fs::remove_file(&staging);
            return Err(self.write_config_error(e));
        }

        tracing::debug!(path = %self.path.display(), "Saved credentials ({})", record.identity());
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Copy a credential file from another path into the active store
///
/// The source must carry every required field. When `sandbox` is absent it
/// is filled from the fallback keys or the default before saving.
pub fn import_credentials<S>(source: &Path, store: &S) -> Result<CredentialRecord>
where
    S: CredentialStore + ?Sized,
{
    let mut record = JsonFileStore::new(source).load()?;

    if record.sandbox.is_none() {
        record.sandbox = Some(record.sandbox().to_string());
    }

    store.save(&record)?;
    tracing::info!(
        source = %source.display(),
        target = %store.location(),
        "Imported credentials ({})",
        record.identity()
    );
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn write_json(path: &Path, value: &Value) {
        fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    }

    fn complete_json() -> Value {
        json!({
            "base_url": "https://platform.example.com",
            "api_key": "key",
            "org_id": "ORG@AdobeOrg",
            "client_id": "client",
            "client_secret": "secret",
            "ims_url": "https://ims.example.com",
            "scopes": ["openid", "AdobeID"],
            "environments": [{ "name": "Development", "sandbox": "dev" }]
        })
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));

        match store.load() {
            Err(TokenError::ConfigError(msg)) => assert!(msg.contains("file not found")),
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_load_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        fs::write(&path, "{ not json").unwrap();

        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, TokenError::ConfigError(_)));

        fs::write(&path, "[1, 2, 3]").unwrap();
        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, TokenError::ConfigError(_)));
    }

    #[test]
    fn test_load_reports_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        write_json(&path, &json!({ "base_url": "https://x", "org_id": "o" }));

        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert_eq!(
            err,
            TokenError::ConfigError(format!(
                "Credentials file {} is missing required fields: api_key, client_id, client_secret",
                path.display()
            ))
        );

        // The lenient reader still parses it
        let record = JsonFileStore::new(&path).read_record().unwrap();
        assert_eq!(record.org_id, "o");
    }

    #[test]
    fn test_save_load_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        write_json(&path, &complete_json());

        let store = JsonFileStore::new(&path);
        let first = store.load().unwrap();
        store.save(&first).unwrap();
        let second = store.load().unwrap();
        assert_eq!(first, second);

        let on_disk: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, complete_json());
    }

    #[test]
    fn test_save_creates_parent_and_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("creds.json");
        let store = JsonFileStore::new(&path);

        let record: CredentialRecord = serde_json::from_value(complete_json()).unwrap();
        store.save(&record).unwrap();

        assert!(path.exists());
        let names: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_save_into_unwritable_location_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "file").unwrap();

        let store = JsonFileStore::new(blocker.join("creds.json"));
        let record: CredentialRecord = serde_json::from_value(complete_json()).unwrap();
        assert!(matches!(store.save(&record), Err(TokenError::ConfigError(_))));
    }

    #[test]
    fn test_import_defaults_sandbox() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("new.json");
        write_json(&source, &complete_json());

        let target = JsonFileStore::new(dir.path().join("active.json"));
        let imported = import_credentials(&source, &target).unwrap();
        assert_eq!(imported.sandbox.as_deref(), Some("prod"));

        let stored = target.load().unwrap();
        assert_eq!(stored, imported);
    }

    #[test]
    fn test_load_prefers_sandbox_over_fallback_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        let mut content = complete_json();
        content["sandbox"] = json!("prod");
        content["sandbox_id"] = json!("dev");
        write_json(&path, &content);

        let store = JsonFileStore::new(&path);
        let record = store.load().unwrap();
        assert_eq!(record.sandbox(), "prod");

        store.save(&record).unwrap();
        let on_disk: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, content);
    }

    #[test]
    fn test_import_keeps_fallback_sandbox() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("new.json");
        let mut content = complete_json();
        content["sandboxId"] = json!("stage");
        write_json(&source, &content);

        let target = JsonFileStore::new(dir.path().join("active.json"));
        let imported = import_credentials(&source, &target).unwrap();
        assert_eq!(imported.sandbox.as_deref(), Some("stage"));
        assert_eq!(target.load().unwrap().sandbox(), "stage");
    }

    #[test]
    fn test_import_rejects_incomplete_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("new.json");
        write_json(&source, &json!({ "base_url": "https://x" }));

        let target = JsonFileStore::new(dir.path().join("active.json"));
        assert!(matches!(
            import_credentials(&source, &target),
            Err(TokenError::ConfigError(_))
        ));
        assert!(!target.path().exists());
    }
}
