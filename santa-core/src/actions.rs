//! State transitions. Each helper takes the current state and returns the
//! next one without touching storage; [`Santa`] applies a transition and
//! then saves it.

use rand::Rng;
use tracing::{info, warn};
use url::form_urlencoded;
use uuid::Uuid;

use crate::draw::generate_assignments;
use crate::store::StateStore;
use crate::{AppState, Participant, RemoteConfig, Result, SantaError};

const AVATAR_BASE: &str = "https://ui-avatars.com/api/";

const DEMO_PARTICIPANTS: [(&str, &str); 6] = [
    ("Ana García", "https://picsum.photos/id/64/400/600"),
    ("Carlos López", "https://picsum.photos/id/91/400/600"),
    ("María Rodriguez", "https://picsum.photos/id/65/400/600"),
    ("Juan Pérez", "https://picsum.photos/id/177/400/600"),
    ("Lucía Fernández", "https://picsum.photos/id/338/400/600"),
    ("Miguel Ángel", "https://picsum.photos/id/334/400/600"),
];

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn avatar_url(name: &str) -> String {
    let name: String = form_urlencoded::byte_serialize(name.as_bytes()).collect();
    format!("{AVATAR_BASE}?name={name}&background=random&size=400")
}

fn ensure_registering(state: &AppState) -> Result<()> {
    if state.is_setup {
        return Err(SantaError::AlreadyDrawn);
    }
    Ok(())
}

pub fn add_participant(state: &AppState, name: &str, photo_url: &str) -> Result<AppState> {
    ensure_registering(state)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(SantaError::EmptyName);
    }
    let photo_url = match photo_url.trim() {
        "" => avatar_url(name),
        url => url.to_string(),
    };

    let mut next = state.clone();
    next.participants.push(Participant {
        id: new_id(),
        name: name.to_string(),
        photo_url,
        is_revealed: false,
    });
    Ok(next)
}

pub fn remove_participant(state: &AppState, id: &str) -> Result<AppState> {
    ensure_registering(state)?;
    if state.participant(id).is_none() {
        return Err(SantaError::ParticipantNotFound(id.to_string()));
    }
    let mut next = state.clone();
    next.participants.retain(|p| p.id != id);
    Ok(next)
}

pub fn load_demo(state: &AppState) -> Result<AppState> {
    ensure_registering(state)?;
    let suffix = new_id();
    let mut next = state.clone();
    next.participants.extend(DEMO_PARTICIPANTS.iter().enumerate().map(
        |(index, (name, photo))| Participant {
            id: format!("demo-{index}-{suffix}"),
            name: name.to_string(),
            photo_url: photo.to_string(),
            is_revealed: false,
        },
    ));
    Ok(next)
}

/// Runs the draw. Repeat draws are independent of earlier ones and drop
/// any game id the previous draw was published under.
pub fn start_draw<R>(state: &AppState, rng: &mut R) -> Result<AppState>
where
    R: Rng + ?Sized,
{
    if state.participants.len() < 2 {
        return Err(SantaError::NotEnoughParticipants);
    }
    let mut next = state.clone();
    next.assignments = generate_assignments(&state.participant_ids(), rng);
    next.is_setup = true;
    next.game_id = None;
    for participant in next.participants.iter_mut() {
        participant.is_revealed = false;
    }
    Ok(next)
}

/// Looks up who `giver_id` gives to, refusing givers that already looked.
pub fn select_giver<'a>(
    state: &'a AppState,
    giver_id: &str,
) -> Result<(&'a Participant, &'a Participant)> {
    if !state.is_setup {
        return Err(SantaError::NotDrawn);
    }
    let giver = state
        .participant(giver_id)
        .ok_or_else(|| SantaError::ParticipantNotFound(giver_id.to_string()))?;
    if giver.is_revealed {
        return Err(SantaError::AlreadyRevealed(giver_id.to_string()));
    }
    let receiver = state
        .receiver_of(giver_id)
        .ok_or_else(|| SantaError::MissingAssignment(giver_id.to_string()))?;
    Ok((giver, receiver))
}

/// Reveal flags only ever go from false to true; repeating is a no-op.
pub fn mark_revealed(state: &AppState, id: &str) -> Result<AppState> {
    let mut next = state.clone();
    let participant = next
        .participants
        .iter_mut()
        .find(|p| p.id == id)
        .ok_or_else(|| SantaError::ParticipantNotFound(id.to_string()))?;
    participant.is_revealed = true;
    Ok(next)
}

/// Application context: the live state plus the store it is saved to.
pub struct Santa<S> {
    store: S,
    state: AppState,
}

impl<S: StateStore> Santa<S> {
    /// Loads the saved state, or starts (and saves) an empty one.
    pub fn open(store: S) -> Result<Self> {
        let saved = match store.load() {
            Ok(saved) => saved,
            Err(err) => {
                warn!("saved state unreadable, starting fresh: {err}");
                None
            }
        };
        match saved {
            Some(state) => Ok(Self { store, state }),
            None => {
                let mut santa = Self {
                    store,
                    state: AppState::default(),
                };
                santa.commit(AppState::default())?;
                Ok(santa)
            }
        }
    }

    /// Wraps an already-chosen state without saving it.
    pub fn with_state(store: S, state: AppState) -> Self {
        Self { store, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Saves `next` and makes it live. On a failed save the live state
    /// stays as it was.
    pub fn commit(&mut self, next: AppState) -> Result<&AppState> {
        self.store.save(&next)?;
        self.state = next;
        Ok(&self.state)
    }

    pub fn add_participant(&mut self, name: &str, photo_url: &str) -> Result<&AppState> {
        let next = add_participant(&self.state, name, photo_url)?;
        self.commit(next)
    }

    pub fn remove_participant(&mut self, id: &str) -> Result<&AppState> {
        let next = remove_participant(&self.state, id)?;
        self.commit(next)
    }

    pub fn load_demo(&mut self) -> Result<&AppState> {
        let next = load_demo(&self.state)?;
        self.commit(next)
    }

    pub fn start_draw<R>(&mut self, rng: &mut R) -> Result<&AppState>
    where
        R: Rng + ?Sized,
    {
        let next = start_draw(&self.state, rng)?;
        info!(participants = next.participants.len(), "draw complete");
        self.commit(next)
    }

    pub fn select_giver(&self, giver_id: &str) -> Result<(&Participant, &Participant)> {
        select_giver(&self.state, giver_id)
    }

    pub fn mark_revealed(&mut self, id: &str) -> Result<&AppState> {
        let next = mark_revealed(&self.state, id)?;
        self.commit(next)
    }

    pub fn set_game_id(&mut self, game_id: impl Into<String>) -> Result<&AppState> {
        let mut next = self.state.clone();
        next.game_id = Some(game_id.into());
        self.commit(next)
    }

    /// Parses a pasted descriptor and keeps it for later loads.
    pub fn save_remote_config(&mut self, pasted: &str) -> Result<RemoteConfig> {
        let config = RemoteConfig::parse_pasted(pasted)?;
        let mut next = self.state.clone();
        next.remote_config = Some(config.clone());
        self.commit(next)?;
        Ok(config)
    }

    /// Clears the slot and starts over with an empty state.
    pub fn reset(&mut self) -> Result<&AppState> {
        self.store.clear()?;
        self.state = AppState::default();
        info!("state reset");
        Ok(&self.state)
    }
}
