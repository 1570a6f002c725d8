//! Share payload: the participants and the draw, minus reveal flags,
//! packed into a token that survives inside a URL fragment.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{AppState, Assignments, Participant, ParticipantId};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SharedParticipant {
    pub id: ParticipantId,
    pub name: String,
    #[serde(default)]
    pub photo_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SharePayload {
    pub participants: Vec<SharedParticipant>,
    #[serde(default)]
    pub assignments: Assignments,
}

impl SharePayload {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            participants: state
                .participants
                .iter()
                .map(|p| SharedParticipant {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    photo_url: p.photo_url.clone(),
                })
                .collect(),
            assignments: state.assignments.clone(),
        }
    }

    /// Every imported participant starts unrevealed.
    pub fn into_state(self) -> AppState {
        let is_setup = !self.assignments.is_empty();
        AppState {
            participants: self
                .participants
                .into_iter()
                .map(|p| Participant {
                    id: p.id,
                    name: p.name,
                    photo_url: p.photo_url,
                    is_revealed: false,
                })
                .collect(),
            assignments: self.assignments,
            is_setup,
            game_id: None,
            remote_config: None,
        }
    }
}

pub fn encode_payload(payload: &SharePayload) -> serde_json::Result<String> {
    let json = serde_json::to_vec(payload)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Corrupt and missing tokens both come back as `None`.
pub fn decode_payload(token: &str) -> Option<SharePayload> {
    let token = token.trim().trim_end_matches('=');
    if token.is_empty() {
        return None;
    }
    let bytes = match URL_SAFE_NO_PAD.decode(token) {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!("share token is not base64: {err}");
            return None;
        }
    };
    let value: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(err) => {
            debug!("share token is not json: {err}");
            return None;
        }
    };
    if !value.get("participants").is_some_and(Value::is_array) {
        debug!("share token has no participant list");
        return None;
    }
    serde_json::from_value(value).ok()
}
