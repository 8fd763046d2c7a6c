//! credentials::file_store
//!
//! File-backed credential persistence.
//!
//! # Security
//!
//! - The collection is stored as JSON (default `~/.repoview/credentials.json`)
//! - File permissions are set to 0600 on Unix (owner read/write only)
//! - All writes are atomic (write to temp file, then rename)
//! - Secrets are NEVER logged, printed, or included in error messages

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use super::traits::{CredentialError, CredentialPersistence};
use super::Credential;

/// Stores the credential collection in a single JSON file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Verify file permissions are 0600 (Unix only).
    ///
    /// Returns true if the file doesn't exist yet.
    #[cfg(unix)]
    pub fn verify_permissions(&self) -> Result<bool, CredentialError> {
        if !self.path.exists() {
            return Ok(true);
        }

        let metadata = fs::metadata(&self.path)
            .map_err(|e| CredentialError::Read(format!("cannot read file metadata: {}", e)))?;

        Ok(metadata.permissions().mode() & 0o777 == 0o600)
    }

    /// Verify file permissions (non-Unix always returns true).
    #[cfg(not(unix))]
    pub fn verify_permissions(&self) -> Result<bool, CredentialError> {
        Ok(true)
    }
}

impl CredentialPersistence for FileCredentialStore {
    fn load(&self) -> Result<Vec<Credential>, CredentialError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| CredentialError::Read(format!("cannot read credentials file: {}", e)))?;

        // serde_json errors carry line/column only, never the offending text
        serde_json::from_str(&content)
            .map_err(|e| CredentialError::Read(format!("cannot parse credentials file: {}", e)))
    }

    fn save(&self, credentials: &[Credential]) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CredentialError::Persist(format!("cannot create directory: {}", e)))?;
        }

        let content = serde_json::to_vec_pretty(credentials)
            .map_err(|e| CredentialError::Persist(format!("cannot serialize: {}", e)))?;

        let temp_path = self.path.with_extension("json.tmp");

        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .map_err(|e| {
                    CredentialError::Persist(format!("cannot create temp file: {}", e))
                })?;

            // Restrict before any secret hits the disk
            #[cfg(unix)]
            {
                file.set_permissions(fs::Permissions::from_mode(0o600))
                    .map_err(|e| {
                        CredentialError::Persist(format!("cannot set permissions: {}", e))
                    })?;
            }

            file.write_all(&content)
                .map_err(|e| CredentialError::Persist(format!("cannot write: {}", e)))?;

            file.sync_all()
                .map_err(|e| CredentialError::Persist(format!("cannot sync to disk: {}", e)))?;
        }

        fs::rename(&temp_path, &self.path)
            .map_err(|e| CredentialError::Persist(format!("cannot rename temp file: {}", e)))?;

        tracing::debug!(
            path = %self.path.display(),
            count = credentials.len(),
            "persisted credentials"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, FileCredentialStore) {
        let temp = TempDir::new().expect("create temp dir");
        let store = FileCredentialStore::new(temp.path().join("credentials.json"));
        (temp, store)
    }

    #[test]
    fn missing_file_loads_empty() {
        let (_temp, store) = create_test_store();
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn save_and_load_preserves_order() {
        let (_temp, store) = create_test_store();
        let creds = vec![
            Credential::password("b", "https://b/", "u", "p"),
            Credential::ssh("a", "git@a:", "pub", "priv"),
        ];

        store.save(&creds).expect("save");
        assert_eq!(store.load().expect("load"), creds);
    }

    #[test]
    fn creates_directory_if_missing() {
        let temp = TempDir::new().expect("create temp dir");
        let path = temp.path().join("nested").join("credentials.json");
        let store = FileCredentialStore::new(path.clone());

        store.save(&[]).expect("save");
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn malformed_file_is_read_error() {
        let (_temp, store) = create_test_store();
        fs::write(store.path(), "{ not json").expect("write");

        match store.load() {
            Err(CredentialError::Read(msg)) => assert!(msg.contains("cannot parse")),
            other => panic!("expected read error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn permissions_0600_on_unix() {
        let (_temp, store) = create_test_store();
        assert!(store.verify_permissions().expect("verify before write"));

        store
            .save(&[Credential::password("a", "https://a/", "u", "p")])
            .expect("save");

        let mode = fs::metadata(store.path()).expect("metadata").permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert!(store.verify_permissions().expect("verify after write"));
    }

    #[test]
    fn save_into_unwritable_location_fails() {
        let temp = TempDir::new().expect("create temp dir");
        // A regular file where the parent directory should be
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "x").expect("write blocker");
        let store = FileCredentialStore::new(blocker.join("credentials.json"));

        assert!(matches!(store.save(&[]), Err(CredentialError::Persist(_))));
    }
}
