use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{AppState, Result};

/// Name of the single local slot holding the application state.
pub const STORAGE_KEY: &str = "amigo_navideno_data";

/// One durable slot holding the serialized [`AppState`].
pub trait StateStore {
    fn load(&self) -> Result<Option<AppState>>;
    fn save(&mut self, state: &AppState) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

/// Keeps the slot as `<dir>/amigo_navideno_data.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{STORAGE_KEY}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStore {
    fn load(&self) -> Result<Option<AppState>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&mut self, state: &AppState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec(state)?;
        fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), "state saved");
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

/// Holds the serialized slot in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Some(raw.into()),
        }
    }

    pub fn raw(&self) -> Option<&str> {
        self.slot.as_deref()
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Option<AppState>> {
        self.slot
            .as_deref()
            .map(serde_json::from_str::<AppState>)
            .transpose()
            .map_err(Into::into)
    }

    fn save(&mut self, state: &AppState) -> Result<()> {
        self.slot = Some(serde_json::to_string(state)?);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.slot = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Participant, RemoteConfig};

    fn sample() -> AppState {
        AppState {
            participants: vec![Participant {
                id: "1".into(),
                name: "Ana".into(),
                photo_url: "https://example.com/a.jpg".into(),
                is_revealed: true,
            }],
            game_id: Some("game".into()),
            remote_config: Some(RemoteConfig {
                api_key: "k".into(),
                project_id: "p".into(),
                ..RemoteConfig::default()
            }),
            ..AppState::default()
        }
    }

    #[test]
    fn file_store_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path());
        assert!(store.load().unwrap().is_none());

        store.save(&sample()).unwrap();
        assert!(store.path().ends_with("amigo_navideno_data.json"));
        assert_eq!(store.load().unwrap(), Some(sample()));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn serialized_keys_are_camel_case() {
        let mut store = MemoryStore::new();
        store.save(&sample()).unwrap();
        let raw = store.raw().unwrap();
        assert!(raw.contains("\"isRevealed\":true"));
        assert!(raw.contains("\"photoUrl\""));
        assert!(raw.contains("\"isSetup\":false"));
        assert!(raw.contains("\"gameId\":\"game\""));
        assert!(raw.contains("\"remoteConfig\""));
    }

    #[test]
    fn corrupt_slot_is_an_error() {
        let store = MemoryStore::with_raw("{oops");
        assert!(store.load().is_err());
    }

    #[test]
    fn minimal_slot_fills_defaults() {
        let store = MemoryStore::with_raw(r#"{"participants":[]}"#);
        assert_eq!(store.load().unwrap(), Some(AppState::default()));
    }
}
