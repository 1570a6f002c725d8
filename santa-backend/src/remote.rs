//! Contract for the shared document a drawn game can be mirrored to.
//!
//! Writes are last-write-wins: a reveal replaces one participant's flag,
//! a create replaces nothing but a racing create elsewhere is not detected.

use std::future::Future;

use chrono::{DateTime, Utc};
use santa_core::{AppState, Assignments, Participant};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::SyncError;

/// Stays under the usual hosted-document ceiling of 1 MiB.
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 900_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    pub participants: Vec<Participant>,
    pub assignments: Assignments,
    pub created_at: DateTime<Utc>,
}

impl RemoteDocument {
    pub fn from_state(state: &AppState, created_at: DateTime<Utc>) -> Self {
        Self {
            participants: state.participants.clone(),
            assignments: state.assignments.clone(),
            created_at,
        }
    }

    /// The state a viewer following `game_id` sees.
    pub fn to_state(&self, game_id: &str) -> AppState {
        AppState {
            participants: self.participants.clone(),
            assignments: self.assignments.clone(),
            is_setup: true,
            game_id: Some(game_id.to_string()),
            remote_config: None,
        }
    }

    pub fn encoded_len(&self) -> Result<usize, SyncError> {
        serde_json::to_vec(self)
            .map(|bytes| bytes.len())
            .map_err(|e| SyncError::Core(e.into()))
    }
}

pub trait RemoteStore: Clone + Send + Sync + 'static {
    /// Stores the drawn game under a fresh id. Oversized games are refused
    /// before anything is written.
    fn create(&self, state: &AppState) -> impl Future<Output = Result<String, SyncError>> + Send;

    fn fetch(&self, game_id: &str)
        -> impl Future<Output = Result<RemoteDocument, SyncError>> + Send;

    /// Calls `on_update` with the current document and then with every
    /// change until the returned handle is cancelled or dropped.
    fn subscribe<F>(
        &self,
        game_id: &str,
        on_update: F,
    ) -> impl Future<Output = Result<Subscription, SyncError>> + Send
    where
        F: Fn(RemoteDocument) + Send + 'static;

    fn mark_revealed(
        &self,
        game_id: &str,
        participant_id: &str,
    ) -> impl Future<Output = Result<(), SyncError>> + Send;
}

/// Live push channel. Dropping it stops delivery.
#[derive(Debug)]
pub struct Subscription {
    game_id: String,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn new(game_id: impl Into<String>, task: JoinHandle<()>) -> Self {
        Self {
            game_id: game_id.into(),
            task,
        }
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!(game_id = %self.game_id, "subscription released");
        self.task.abort();
    }
}
