//! credentials::store
//!
//! The ordered credential collection and its lookup policy.
//!
//! # Invariants
//!
//! - Every id is non-empty and unique across the store.
//! - The in-memory collection always equals the last successful save: a
//!   mutation whose save fails is rolled back before the error returns.
//! - Lookup order is insertion order; a replacement keeps the position of
//!   the entry it replaces.

use super::traits::{CredentialError, CredentialPersistence, ValidationError};
use super::{Credential, FileCredentialStore, MemoryCredentialStore};

/// Ordered credential collection backed by a persistence backend.
pub struct CredentialStore {
    credentials: Vec<Credential>,
    backend: Box<dyn CredentialPersistence>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("ids", &self.ids().collect::<Vec<_>>())
            .finish()
    }
}

impl CredentialStore {
    /// Load the collection from `backend`.
    ///
    /// Malformed or unreadable data is logged and the store starts empty;
    /// loading never fails.
    pub fn open(backend: impl CredentialPersistence + 'static) -> Self {
        let credentials = match backend.load() {
            Ok(credentials) => credentials,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable credential store");
                Vec::new()
            }
        };
        tracing::debug!(count = credentials.len(), "loaded credentials");

        Self {
            credentials,
            backend: Box::new(backend),
        }
    }

    /// Open a JSON file-backed store.
    pub fn with_file(path: impl Into<std::path::PathBuf>) -> Self {
        Self::open(FileCredentialStore::new(path))
    }

    /// An empty, memory-only store.
    pub fn in_memory() -> Self {
        Self::open(MemoryCredentialStore::new())
    }

    /// First credential (insertion order) whose target URL prefixes `url`.
    ///
    /// # Example
    ///
    /// ```
    /// use repoview::credentials::{Credential, CredentialStore};
    ///
    /// let mut store = CredentialStore::in_memory();
    /// store
    ///     .add_or_update(None, Credential::password("gh", "https://github.com/", "me", "pw"))
    ///     .unwrap();
    ///
    /// assert_eq!(store.lookup("https://github.com/org/repo.git").unwrap().id, "gh");
    /// assert!(store.lookup("https://gitlab.com/org/repo.git").is_none());
    /// ```
    pub fn lookup(&self, url: &str) -> Option<&Credential> {
        self.credentials.iter().find(|c| c.matches(url))
    }

    pub fn get(&self, id: &str) -> Option<&Credential> {
        self.credentials.iter().find(|c| c.id == id)
    }

    pub fn all(&self) -> &[Credential] {
        &self.credentials
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.credentials.iter().map(|c| c.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.credentials.iter().position(|c| c.id == id)
    }

    /// Insert `credential`, or replace the entry identified by `old_id`.
    ///
    /// # Errors
    ///
    /// - `ValidationError::UnknownId` if `old_id` does not resolve
    /// - `ValidationError::EmptyId` if the new id is empty
    /// - `ValidationError::DuplicateId` if the new id belongs to another entry
    /// - `CredentialError::Persist` if saving fails (the change is rolled back)
    pub fn add_or_update(
        &mut self,
        old_id: Option<&str>,
        credential: Credential,
    ) -> Result<(), CredentialError> {
        match old_id {
            Some(old_id) => {
                let index = self
                    .position(old_id)
                    .ok_or_else(|| ValidationError::UnknownId(old_id.to_string()))?;
                self.validate_id(&credential.id, Some(index))?;

                let previous = std::mem::replace(&mut self.credentials[index], credential);
                if let Err(e) = self.persist() {
                    self.credentials[index] = previous;
                    return Err(e);
                }
                tracing::info!(old_id, new_id = %self.credentials[index].id, "replaced credential");
            }
            None => {
                self.validate_id(&credential.id, None)?;

                self.credentials.push(credential);
                if let Err(e) = self.persist() {
                    self.credentials.pop();
                    return Err(e);
                }
                if let Some(added) = self.credentials.last() {
                    tracing::info!(id = %added.id, kind = %added.kind(), "added credential");
                }
            }
        }
        Ok(())
    }

    /// `id` must be non-empty and not used by any entry other than `replacing`.
    fn validate_id(&self, id: &str, replacing: Option<usize>) -> Result<(), ValidationError> {
        if id.is_empty() {
            return Err(ValidationError::EmptyId);
        }
        match self.position(id) {
            Some(existing) if Some(existing) != replacing => {
                Err(ValidationError::DuplicateId(id.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Remove every credential whose id is in `ids`. Unknown ids are ignored.
    ///
    /// Returns the number of removed entries.
    ///
    /// # Errors
    ///
    /// `CredentialError::Persist` if saving fails; the removed entries are
    /// restored at their original positions.
    pub fn remove<I, S>(&mut self, ids: I) -> Result<usize, CredentialError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: Vec<S> = ids.into_iter().collect();
        let before = self.credentials.clone();
        self.credentials
            .retain(|c| !ids.iter().any(|id| id.as_ref() == c.id));

        let removed = before.len() - self.credentials.len();
        if removed == 0 {
            return Ok(0);
        }

        if let Err(e) = self.persist() {
            tracing::warn!(error = %e, "credential removal not persisted, restoring");
            self.credentials = before;
            return Err(e);
        }
        tracing::info!(removed, "removed credentials");
        Ok(removed)
    }

    fn persist(&self) -> Result<(), CredentialError> {
        self.backend.save(&self.credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pw(id: &str, url: &str) -> Credential {
        Credential::password(id, url, "user", "pass")
    }

    fn store_with(creds: &[Credential]) -> (MemoryCredentialStore, CredentialStore) {
        let backend = MemoryCredentialStore::with_credentials(creds.to_vec());
        let store = CredentialStore::open(backend.clone());
        (backend, store)
    }

    #[test]
    fn lookup_first_match_in_insertion_order() {
        let (_b, store) = store_with(&[
            pw("broad", "https://github.com/"),
            pw("narrow", "https://github.com/org/"),
        ]);

        // Insertion order wins over prefix length
        let found = store.lookup("https://github.com/org/repo.git").unwrap();
        assert_eq!(found.id, "broad");
    }

    #[test]
    fn lookup_absent_when_no_prefix_matches() {
        let (_b, store) = store_with(&[pw("gh", "https://github.com/")]);
        assert!(store.lookup("ssh://github.com/org/repo").is_none());
        assert!(store.lookup("").is_none());
    }

    #[test]
    fn add_rejects_empty_id() {
        let (backend, mut store) = store_with(&[]);
        let err = store.add_or_update(None, pw("", "https://a/")).unwrap_err();
        assert!(matches!(
            err,
            CredentialError::Validation(ValidationError::EmptyId)
        ));
        assert_eq!(backend.save_count(), 0);
    }

    #[test]
    fn add_rejects_duplicate_id() {
        let (_b, mut store) = store_with(&[pw("a", "https://a/")]);
        let err = store.add_or_update(None, pw("a", "https://b/")).unwrap_err();
        assert!(matches!(
            err,
            CredentialError::Validation(ValidationError::DuplicateId(id)) if id == "a"
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn update_rejects_unknown_old_id() {
        let (_b, mut store) = store_with(&[pw("a", "https://a/")]);
        let err = store
            .add_or_update(Some("missing"), pw("b", "https://b/"))
            .unwrap_err();
        assert!(matches!(
            err,
            CredentialError::Validation(ValidationError::UnknownId(_))
        ));
    }

    #[test]
    fn update_keeps_position_and_persists() {
        let (backend, mut store) = store_with(&[
            pw("a", "https://a/"),
            pw("b", "https://b/"),
            pw("c", "https://c/"),
        ]);

        store
            .add_or_update(Some("b"), pw("b2", "https://b2/"))
            .unwrap();

        assert_eq!(store.ids().collect::<Vec<_>>(), vec!["a", "b2", "c"]);
        assert_eq!(backend.saved()[1].id, "b2");
    }

    #[test]
    fn update_may_keep_same_id() {
        let (_b, mut store) = store_with(&[pw("a", "https://old/")]);
        store
            .add_or_update(Some("a"), pw("a", "https://new/"))
            .unwrap();
        assert_eq!(store.get("a").unwrap().target_url, "https://new/");
    }

    #[test]
    fn update_rejects_collision_with_other_entry() {
        let (_b, mut store) = store_with(&[pw("a", "https://a/"), pw("b", "https://b/")]);
        let err = store
            .add_or_update(Some("a"), pw("b", "https://x/"))
            .unwrap_err();
        assert!(matches!(
            err,
            CredentialError::Validation(ValidationError::DuplicateId(_))
        ));
        assert_eq!(store.get("a").unwrap().target_url, "https://a/");
    }

    #[test]
    fn failed_save_rolls_back_add() {
        let (backend, mut store) = store_with(&[pw("a", "https://a/")]);
        backend.set_fail_saves(true);

        let err = store.add_or_update(None, pw("b", "https://b/")).unwrap_err();
        assert!(matches!(err, CredentialError::Persist(_)));
        assert_eq!(store.ids().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn failed_save_rolls_back_update() {
        let (backend, mut store) = store_with(&[pw("a", "https://a/")]);
        backend.set_fail_saves(true);

        assert!(store
            .add_or_update(Some("a"), pw("z", "https://z/"))
            .is_err());
        assert_eq!(store.get("a").unwrap().target_url, "https://a/");
    }

    #[test]
    fn remove_by_ids() {
        let (backend, mut store) = store_with(&[
            pw("a", "https://a/"),
            pw("b", "https://b/"),
            pw("c", "https://c/"),
        ]);

        let removed = store.remove(["a", "c", "missing"]).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.ids().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(backend.saved().len(), 1);
    }

    #[test]
    fn remove_nothing_does_not_save() {
        let (backend, mut store) = store_with(&[pw("a", "https://a/")]);
        assert_eq!(store.remove(["zzz"]).unwrap(), 0);
        assert_eq!(backend.save_count(), 0);
    }

    #[test]
    fn failed_remove_restores_positions() {
        let (backend, mut store) = store_with(&[
            pw("a", "https://a/"),
            pw("b", "https://b/"),
            pw("c", "https://c/"),
        ]);
        backend.set_fail_saves(true);

        assert!(store.remove(["b"]).is_err());
        assert_eq!(store.ids().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn malformed_backend_opens_empty() {
        let backend = MemoryCredentialStore::with_credentials(vec![pw("a", "https://a/")]);
        backend.set_corrupt(true);

        let store = CredentialStore::open(backend);
        assert!(store.is_empty());
    }

    #[test]
    fn debug_lists_ids_only() {
        let (_b, store) = store_with(&[Credential::password("a", "https://a/", "u", "topsecret")]);
        let debug = format!("{:?}", store);
        assert!(debug.contains("\"a\""));
        assert!(!debug.contains("topsecret"));
    }
}
