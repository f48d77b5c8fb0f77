use crate::error::GameError;
use chrono::Utc;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

pub const STATE_ROOT: &str = ".doors";
const SESSION_FILE: &str = "session.json";

/// What survives a restart: the intent to be connected and who was connected.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub connected: bool,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub saved_at: Option<String>,
}

impl PersistedSession {
    pub fn connected(account: impl Into<String>) -> Self {
        Self {
            connected: true,
            account: Some(account.into()),
            saved_at: Some(Utc::now().to_rfc3339()),
        }
    }
}

pub trait SessionStore {
    fn load(&self) -> Result<Option<PersistedSession>, GameError>;

    fn save(&mut self, session: &PersistedSession) -> Result<(), GameError>;

    /// Forget the persisted session entirely.
    fn clear(&mut self) -> Result<(), GameError>;
}

#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, GameError> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|e| {
            GameError::Persistence(format!(
                "failed to create state directory {}: {e}",
                root.display()
            ))
        })?;
        Ok(Self {
            path: root.join(SESSION_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<PersistedSession>, GameError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read(&self.path).map_err(|e| {
            GameError::Persistence(format!("failed to read {}: {e}", self.path.display()))
        })?;
        if data.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&data).map(Some).map_err(|e| {
            GameError::Persistence(format!("failed to parse {}: {e}", self.path.display()))
        })
    }

    fn save(&mut self, session: &PersistedSession) -> Result<(), GameError> {
        let json = serde_json::to_vec_pretty(session)
            .map_err(|e| GameError::Persistence(format!("failed to serialize: {e}")))?;
        fs::write(&self.path, json).map_err(|e| {
            GameError::Persistence(format!("failed to write {}: {e}", self.path.display()))
        })
    }

    fn clear(&mut self) -> Result<(), GameError> {
        if !self.path.exists() {
            return Ok(());
        }
        fs::remove_file(&self.path).map_err(|e| {
            GameError::Persistence(format!("failed to remove {}: {e}", self.path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn load__no_file__returns_none() {
        let dir = TempDir::new("doors-state").unwrap();
        let store = FileSessionStore::new(dir.path()).unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn save_then_load__returns_same_session() {
        // given
        let dir = TempDir::new("doors-state").unwrap();
        let mut store = FileSessionStore::new(dir.path()).unwrap();
        let session = PersistedSession::connected("ab".repeat(32));

        // when
        store.save(&session).unwrap();

        // then
        let reopened = FileSessionStore::new(dir.path()).unwrap();
        assert_eq!(reopened.load().unwrap(), Some(session));
    }

    #[test]
    fn clear__removes_persisted_session() {
        // given
        let dir = TempDir::new("doors-state").unwrap();
        let mut store = FileSessionStore::new(dir.path()).unwrap();
        store.save(&PersistedSession::connected("00")).unwrap();

        // when
        store.clear().unwrap();

        // then
        assert_eq!(store.load().unwrap(), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn load__legacy_file_without_timestamp__parses() {
        let dir = TempDir::new("doors-state").unwrap();
        let store = FileSessionStore::new(dir.path()).unwrap();
        fs::write(store.path(), br#"{"connected":true,"account":"0x01"}"#).unwrap();

        let loaded = store.load().unwrap().unwrap();

        assert!(loaded.connected);
        assert_eq!(loaded.account.as_deref(), Some("0x01"));
        assert_eq!(loaded.saved_at, None);
    }

    #[test]
    fn load__corrupt_file__is_a_persistence_error() {
        let dir = TempDir::new("doors-state").unwrap();
        let store = FileSessionStore::new(dir.path()).unwrap();
        fs::write(store.path(), b"not json").unwrap();

        assert!(matches!(store.load(), Err(GameError::Persistence(_))));
    }
}
