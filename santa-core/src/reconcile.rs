//! Load-time choice of where the session's state comes from.
//!
//! Sources are tried in a fixed order and the first one that produces
//! something wins; later sources are never consulted, so a link payload
//! cannot overwrite local state when a cloud game id is also present.

use tracing::{info, warn};

use crate::codec::decode_payload;
use crate::link::LaunchUrl;
use crate::store::StateStore;
use crate::{AppState, RemoteConfig, Result, Santa};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Follow the remote document for `game_id`.
    Cloud { game_id: String, config: RemoteConfig },
    /// Imported from a share link; replaces local state.
    Link(AppState),
    /// Last saved local state.
    Local(AppState),
    /// Nothing found anywhere.
    Fresh,
}

pub trait StateSource {
    fn name(&self) -> &'static str;
    fn try_load(&self) -> Option<Origin>;
}

pub struct CloudSource {
    game_id: Option<String>,
    env_config: Option<RemoteConfig>,
    saved_config: Option<RemoteConfig>,
}

impl CloudSource {
    pub fn new(
        game_id: Option<String>,
        env_config: Option<RemoteConfig>,
        saved_config: Option<RemoteConfig>,
    ) -> Self {
        Self {
            game_id,
            env_config,
            saved_config,
        }
    }
}

impl StateSource for CloudSource {
    fn name(&self) -> &'static str {
        "cloud"
    }

    fn try_load(&self) -> Option<Origin> {
        let game_id = self.game_id.clone()?;
        let config = self
            .env_config
            .clone()
            .or_else(|| self.saved_config.clone());
        match config {
            Some(config) => Some(Origin::Cloud { game_id, config }),
            None => {
                warn!(%game_id, "game id given but no remote configuration available");
                None
            }
        }
    }
}

pub struct LinkSource {
    token: Option<String>,
}

impl LinkSource {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

impl StateSource for LinkSource {
    fn name(&self) -> &'static str {
        "link"
    }

    fn try_load(&self) -> Option<Origin> {
        let token = self.token.as_deref()?;
        match decode_payload(token) {
            Some(payload) => Some(Origin::Link(payload.into_state())),
            None => {
                warn!("share link payload unreadable, ignoring");
                None
            }
        }
    }
}

pub struct LocalSource<'a, S> {
    store: &'a S,
}

impl<'a, S> LocalSource<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }
}

impl<S: StateStore> StateSource for LocalSource<'_, S> {
    fn name(&self) -> &'static str {
        "local"
    }

    fn try_load(&self) -> Option<Origin> {
        match self.store.load() {
            Ok(state) => state.map(Origin::Local),
            Err(err) => {
                warn!("saved state unreadable: {err}");
                None
            }
        }
    }
}

pub struct Reconciler<'a> {
    sources: Vec<Box<dyn StateSource + 'a>>,
}

impl<'a> Reconciler<'a> {
    pub fn new(sources: Vec<Box<dyn StateSource + 'a>>) -> Self {
        Self { sources }
    }

    /// Cloud id, then link payload, then local slot.
    pub fn standard<S: StateStore>(
        launch: &LaunchUrl,
        store: &'a S,
        env_config: Option<RemoteConfig>,
    ) -> Self {
        let saved_config = store
            .load()
            .ok()
            .flatten()
            .and_then(|state| state.remote_config);
        Self::new(vec![
            Box::new(CloudSource::new(
                launch.game_id.clone(),
                env_config,
                saved_config,
            )),
            Box::new(LinkSource::new(launch.fragment_token.clone())),
            Box::new(LocalSource::new(store)),
        ])
    }

    pub fn resolve(&self) -> Origin {
        for source in &self.sources {
            if let Some(origin) = source.try_load() {
                info!(source = source.name(), "state source selected");
                return origin;
            }
        }
        info!("no saved state, starting fresh");
        Origin::Fresh
    }
}

/// What the session runs on after the load-time decision.
pub enum Start<S> {
    Cloud {
        game_id: String,
        config: RemoteConfig,
        store: S,
    },
    Local(Santa<S>),
}

impl Origin {
    /// Makes the chosen origin live. Only a link import or a fresh start
    /// writes the local slot; the cloud path leaves it untouched.
    pub fn establish<S: StateStore>(self, mut store: S) -> Result<Start<S>> {
        match self {
            Origin::Cloud { game_id, config } => Ok(Start::Cloud {
                game_id,
                config,
                store,
            }),
            Origin::Link(state) => {
                store.save(&state)?;
                Ok(Start::Local(Santa::with_state(store, state)))
            }
            Origin::Local(state) => Ok(Start::Local(Santa::with_state(store, state))),
            Origin::Fresh => {
                let state = AppState::default();
                store.save(&state)?;
                Ok(Start::Local(Santa::with_state(store, state)))
            }
        }
    }
}

/// Resolves and establishes the standard source order in one step.
pub fn start<S: StateStore>(
    launch: &LaunchUrl,
    store: S,
    env_config: Option<RemoteConfig>,
) -> Result<Start<S>> {
    let origin = Reconciler::standard(launch, &store, env_config).resolve();
    origin.establish(store)
}
