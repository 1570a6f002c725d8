use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use santa_core::{AppState, RemoteConfig};
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::SyncError;
use crate::remote::{RemoteDocument, RemoteStore, Subscription, DEFAULT_MAX_DOCUMENT_BYTES};

const CHANNEL_CAPACITY: usize = 32;

/// Hosted game documents, one broadcast channel per game.
#[derive(Clone)]
pub struct DocumentStore {
    games: Arc<RwLock<HashMap<String, RemoteDocument>>>,
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<RemoteDocument>>>>,
    persist_path: Option<PathBuf>,
    max_document_bytes: usize,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self {
            games: Arc::new(RwLock::new(HashMap::new())),
            channels: Arc::new(RwLock::new(HashMap::new())),
            persist_path: None,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }
}

impl DocumentStore {
    pub fn with_limit(mut self, max_document_bytes: usize) -> Self {
        self.max_document_bytes = max_document_bytes;
        self
    }

    pub async fn with_persistence(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut store = Self::default();
        store.persist_path = Some(path.clone());
        match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<HashMap<String, RemoteDocument>>(&bytes) {
                Ok(saved) => {
                    info!(games = saved.len(), path = %path.display(), "loaded saved games");
                    *store.games.write().await = saved;
                }
                Err(err) => warn!(path = %path.display(), "ignoring unreadable game file: {err}"),
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %path.display(), "cannot read game file: {err}"),
        }
        store
    }

    /// Checks the descriptor and hands back a handle to this store.
    pub fn connect(&self, config: &RemoteConfig) -> Result<Self, SyncError> {
        config.validate()?;
        info!(project = %config.project_id, "remote connected");
        Ok(self.clone())
    }

    pub fn max_document_bytes(&self) -> usize {
        self.max_document_bytes
    }

    #[cfg(test)]
    pub(crate) async fn game_count(&self) -> usize {
        self.games.read().await.len()
    }

    async fn persist(&self) {
        if let Some(path) = &self.persist_path {
            let snapshot = {
                let games = self.games.read().await;
                games.clone()
            };
            match serde_json::to_vec_pretty(&snapshot) {
                Ok(json) => {
                    if let Err(err) = tokio::fs::write(path, json).await {
                        error!("persist error: {err}");
                    }
                }
                Err(err) => error!("persist encode error: {err}"),
            }
        }
    }

    /// Lock order is always `games` then `channels`.
    async fn sender(&self, game_id: &str) -> broadcast::Sender<RemoteDocument> {
        let mut channels = self.channels.write().await;
        channels
            .entry(game_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

impl RemoteStore for DocumentStore {
    async fn create(&self, state: &AppState) -> Result<String, SyncError> {
        let document = RemoteDocument::from_state(state, Utc::now());
        let size = document.encoded_len()?;
        if size > self.max_document_bytes {
            warn!(size, limit = self.max_document_bytes, "game refused, too large");
            return Err(SyncError::PayloadTooLarge {
                size,
                limit: self.max_document_bytes,
            });
        }

        let game_id = Uuid::new_v4().simple().to_string();
        {
            let mut games = self.games.write().await;
            games.insert(game_id.clone(), document.clone());
            let _ = self.sender(&game_id).await.send(document);
        }
        self.persist().await;
        info!(%game_id, size, "game created");
        Ok(game_id)
    }

    async fn fetch(&self, game_id: &str) -> Result<RemoteDocument, SyncError> {
        self.games
            .read()
            .await
            .get(game_id)
            .cloned()
            .ok_or(SyncError::GameNotFound)
    }

    async fn subscribe<F>(&self, game_id: &str, on_update: F) -> Result<Subscription, SyncError>
    where
        F: Fn(RemoteDocument) + Send + 'static,
    {
        // Writers publish under the games lock, so holding it here keeps
        // the snapshot and the receiver in step. Unknown ids get no channel.
        let (snapshot, mut rx) = {
            let games = self.games.read().await;
            let snapshot = games.get(game_id).cloned().ok_or(SyncError::GameNotFound)?;
            (snapshot, self.sender(game_id).await.subscribe())
        };

        let store = self.clone();
        let id = game_id.to_string();
        let task = tokio::spawn(async move {
            on_update(snapshot);
            loop {
                match rx.recv().await {
                    Ok(document) => on_update(document),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(game_id = %id, skipped, "subscriber lagged, resending latest");
                        match store.fetch(&id).await {
                            Ok(document) => on_update(document),
                            Err(_) => break,
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        info!(%game_id, "subscribed");
        Ok(Subscription::new(game_id, task))
    }

    async fn mark_revealed(&self, game_id: &str, participant_id: &str) -> Result<(), SyncError> {
        {
            let mut games = self.games.write().await;
            let document = games.get_mut(game_id).ok_or(SyncError::GameNotFound)?;
            let participant = document
                .participants
                .iter_mut()
                .find(|p| p.id == participant_id)
                .ok_or(SyncError::ParticipantNotFound)?;
            if participant.is_revealed {
                return Ok(());
            }
            participant.is_revealed = true;
            let document = document.clone();
            // Sent under the lock so pushes leave in write order.
            let _ = self.sender(game_id).await.send(document);
        }
        self.persist().await;
        info!(%game_id, %participant_id, "participant revealed");
        Ok(())
    }
}
