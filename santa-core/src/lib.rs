//! Secret Santa state: participants, the gift-giving draw, and the
//! ways a drawn game travels between devices (local slot, share link,
//! remote document).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod actions;
pub mod codec;
pub mod config;
pub mod draw;
mod error;
pub mod link;
pub mod reconcile;
pub mod store;

pub use actions::Santa;
pub use codec::{decode_payload, encode_payload, SharePayload, SharedParticipant};
pub use config::RemoteConfig;
pub use draw::{assign_cycle, generate_assignments};
pub use error::{Result, SantaError};
pub use link::{cloud_link, offline_link, LaunchUrl};
pub use reconcile::{Origin, Reconciler, Start, StateSource};
pub use store::{FileStore, MemoryStore, StateStore, STORAGE_KEY};

pub type ParticipantId = String;

/// Giver id to receiver id.
pub type Assignments = BTreeMap<ParticipantId, ParticipantId>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub photo_url: String,
    #[serde(default)]
    pub is_revealed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub assignments: Assignments,
    #[serde(default)]
    pub is_setup: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_config: Option<RemoteConfig>,
}

impl AppState {
    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn receiver_of(&self, giver_id: &str) -> Option<&Participant> {
        self.assignments
            .get(giver_id)
            .and_then(|receiver| self.participant(receiver))
    }

    pub fn participant_ids(&self) -> Vec<ParticipantId> {
        self.participants.iter().map(|p| p.id.clone()).collect()
    }
}
