//! Persisted session values: the access token, the "session ended" marker
//! and the auth service's cookies.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;

/// Storage for the current session.
///
/// There is exactly one current access token; every write replaces it.
pub trait TokenStore: Send + Sync {
    /// The current access token, if any.
    fn access_token(&self) -> Result<Option<String>, ApiError>;

    /// Replace the current access token.
    fn set_access_token(&self, token: &str) -> Result<(), ApiError>;

    /// Cookie header captured from the auth service (`name=value; ...`).
    fn cookies(&self) -> Result<Option<String>, ApiError>;

    /// Replace the stored cookie header. An empty string removes it.
    fn set_cookies(&self, cookies: &str) -> Result<(), ApiError>;

    /// Whether the last session was ended by the client rather than by an
    /// explicit logout.
    fn session_ended(&self) -> Result<bool, ApiError>;

    fn set_session_ended(&self, ended: bool) -> Result<(), ApiError>;

    /// Remove the token and cookies. The session-ended marker is cleared too.
    fn clear(&self) -> Result<(), ApiError>;
}

/// Everything a store keeps, in one serializable record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub session_ended: bool,
}

/// In-process store. Lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    inner: RwLock<StoredSession>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a token already present.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(StoredSession {
                access_token: Some(token.into()),
                ..Default::default()
            }),
        }
    }

    fn read(&self) -> StoredSession {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn update(&self, f: impl FnOnce(&mut StoredSession)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}

impl TokenStore for MemoryTokenStore {
    fn access_token(&self) -> Result<Option<String>, ApiError> {
        Ok(self.read().access_token)
    }

    fn set_access_token(&self, token: &str) -> Result<(), ApiError> {
        self.update(|s| s.access_token = Some(token.to_string()));
        Ok(())
    }

    fn cookies(&self) -> Result<Option<String>, ApiError> {
        Ok(self.read().cookies)
    }

    fn set_cookies(&self, cookies: &str) -> Result<(), ApiError> {
        self.update(|s| s.cookies = non_empty(cookies));
        Ok(())
    }

    fn session_ended(&self) -> Result<bool, ApiError> {
        Ok(self.read().session_ended)
    }

    fn set_session_ended(&self, ended: bool) -> Result<(), ApiError> {
        self.update(|s| s.session_ended = ended);
        Ok(())
    }

    fn clear(&self) -> Result<(), ApiError> {
        self.update(|s| *s = StoredSession::default());
        Ok(())
    }
}

/// TOML file store, so a session survives between CLI invocations.
///
/// The file is re-read on every access; the lock only serializes writers
/// within this process.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record, or an empty one if the file doesn't exist.
    pub fn load(&self) -> Result<StoredSession, ApiError> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        self.load_unlocked()
    }

    fn load_unlocked(&self) -> Result<StoredSession, ApiError> {
        if !self.path.exists() {
            return Ok(StoredSession::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| ApiError::Storage(format!("{}: {}", self.path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| ApiError::Storage(format!("{}: {}", self.path.display(), e)))
    }

    fn update(&self, f: impl FnOnce(&mut StoredSession)) -> Result<(), ApiError> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let mut session = self.load_unlocked()?;
        f(&mut session);
        self.save_unlocked(&session)
    }

    fn save_unlocked(&self, session: &StoredSession) -> Result<(), ApiError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ApiError::Storage(e.to_string()))?;
        }
        let content =
            toml::to_string_pretty(session).map_err(|e| ApiError::Storage(e.to_string()))?;
        std::fs::write(&self.path, content).map_err(|e| ApiError::Storage(e.to_string()))?;
        debug!("session written to {}", self.path.display());
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn access_token(&self) -> Result<Option<String>, ApiError> {
        Ok(self.load()?.access_token)
    }

    fn set_access_token(&self, token: &str) -> Result<(), ApiError> {
        self.update(|s| s.access_token = Some(token.to_string()))
    }

    fn cookies(&self) -> Result<Option<String>, ApiError> {
        Ok(self.load()?.cookies)
    }

    fn set_cookies(&self, cookies: &str) -> Result<(), ApiError> {
        self.update(|s| s.cookies = non_empty(cookies))
    }

    fn session_ended(&self) -> Result<bool, ApiError> {
        Ok(self.load()?.session_ended)
    }

    fn set_session_ended(&self, ended: bool) -> Result<(), ApiError> {
        self.update(|s| s.session_ended = ended)
    }

    fn clear(&self) -> Result<(), ApiError> {
        self.update(|s| *s = StoredSession::default())
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn TokenStore) {
        assert_eq!(store.access_token().unwrap(), None);

        store.set_access_token("first").unwrap();
        store.set_access_token("second").unwrap();
        assert_eq!(store.access_token().unwrap().as_deref(), Some("second"));

        store.set_cookies("refresh_token_cookie=r1; csrf_refresh_token=c1").unwrap();
        assert_eq!(
            store.cookies().unwrap().as_deref(),
            Some("refresh_token_cookie=r1; csrf_refresh_token=c1")
        );
        store.set_cookies("  ").unwrap();
        assert_eq!(store.cookies().unwrap(), None);

        store.set_session_ended(true).unwrap();
        assert!(store.session_ended().unwrap());

        store.clear().unwrap();
        assert_eq!(store.access_token().unwrap(), None);
        assert!(!store.session_ended().unwrap());
    }

    #[test]
    fn memory_store() {
        exercise(&MemoryTokenStore::new());
    }

    #[test]
    fn memory_store_with_token() {
        let store = MemoryTokenStore::with_token("abc");
        assert_eq!(store.access_token().unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn file_store() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&FileTokenStore::new(dir.path().join("sessions/default.toml")));
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");

        let store = FileTokenStore::new(&path);
        store.set_access_token("persisted").unwrap();
        store.set_session_ended(true).unwrap();
        drop(store);

        let reopened = FileTokenStore::new(&path);
        assert_eq!(reopened.access_token().unwrap().as_deref(), Some("persisted"));
        assert!(reopened.session_ended().unwrap());
    }

    #[test]
    fn file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");
        std::fs::write(&path, "access_token = [not toml").unwrap();
        let store = FileTokenStore::new(&path);
        assert!(matches!(store.access_token(), Err(ApiError::Storage(_))));
    }
}
