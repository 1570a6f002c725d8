//! A viewer's session: picks its state source at load, then either works
//! on local state (optionally mirrored to a remote document after
//! publishing) or follows a remote document's push updates.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use santa_core::reconcile::{self, Start};
use santa_core::{
    actions, cloud_link, offline_link, AppState, LaunchUrl, Participant, RemoteConfig, Santa,
    SantaError, StateStore,
};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::SyncError;
use crate::remote::{RemoteStore, Subscription};

type Connector<R> = Box<dyn Fn(&RemoteConfig) -> Result<R, SyncError> + Send + Sync>;

struct Follow {
    view: watch::Receiver<Option<AppState>>,
    subscription: Subscription,
}

struct CloudLink<R> {
    game_id: String,
    remote: R,
    /// Set when the session was opened on a cloud game id.
    follow: Option<Follow>,
}

pub struct Session<S, R> {
    santa: Santa<S>,
    env_config: Option<RemoteConfig>,
    connect: Connector<R>,
    cloud: Option<CloudLink<R>>,
    startup_error: Option<SyncError>,
}

impl<S: StateStore, R: RemoteStore> Session<S, R> {
    /// Runs the load-time source choice. A cloud game that cannot be
    /// reached leaves the session on local state and records the error.
    pub async fn start<C>(
        launch: &LaunchUrl,
        store: S,
        env_config: Option<RemoteConfig>,
        connect: C,
    ) -> Result<Self, SyncError>
    where
        C: Fn(&RemoteConfig) -> Result<R, SyncError> + Send + Sync + 'static,
    {
        let mut session = match reconcile::start(launch, store, env_config.clone())? {
            Start::Local(santa) => Self {
                santa,
                env_config,
                connect: Box::new(connect),
                cloud: None,
                startup_error: None,
            },
            Start::Cloud {
                game_id,
                config,
                store,
            } => {
                let local = match store.load() {
                    Ok(state) => state.unwrap_or_default(),
                    Err(err) => {
                        warn!("saved state unreadable: {err}");
                        AppState::default()
                    }
                };
                let mut session = Self {
                    santa: Santa::with_state(store, local),
                    env_config,
                    connect: Box::new(connect),
                    cloud: None,
                    startup_error: None,
                };
                if let Err(err) = session.follow(&game_id, &config).await {
                    warn!(%game_id, "cannot follow cloud game, using local state: {err}");
                    session.startup_error = Some(err);
                }
                session
            }
        };
        if session.cloud.is_none() && session.santa.store().load().ok().flatten().is_none() {
            let fresh = session.santa.state().clone();
            session.santa.commit(fresh)?;
        }
        Ok(session)
    }

    async fn follow(&mut self, game_id: &str, config: &RemoteConfig) -> Result<(), SyncError> {
        let remote = (self.connect)(config)?;
        let (tx, view) = watch::channel(None);
        let id = game_id.to_string();
        let subscription = remote
            .subscribe(game_id, move |document| {
                tx.send_replace(Some(document.to_state(&id)));
            })
            .await?;
        self.cloud = Some(CloudLink {
            game_id: game_id.to_string(),
            remote,
            follow: Some(Follow { view, subscription }),
        });
        Ok(())
    }

    pub fn startup_error(&self) -> Option<&SyncError> {
        self.startup_error.as_ref()
    }

    pub fn is_following(&self) -> bool {
        self.cloud.as_ref().is_some_and(|c| c.follow.is_some())
    }

    pub fn game_id(&self) -> Option<&str> {
        self.cloud.as_ref().map(|c| c.game_id.as_str())
    }

    /// The state on screen: the latest remote document when following,
    /// local state otherwise.
    pub fn state(&self) -> AppState {
        match self.cloud.as_ref().and_then(|c| c.follow.as_ref().map(|f| (c, f))) {
            Some((cloud, follow)) => follow.view.borrow().clone().unwrap_or_else(|| AppState {
                is_setup: true,
                game_id: Some(cloud.game_id.clone()),
                ..AppState::default()
            }),
            None => self.santa.state().clone(),
        }
    }

    /// Waits for the next pushed document.
    pub async fn changed(&mut self) -> Result<AppState, SyncError> {
        let follow = self
            .cloud
            .as_mut()
            .and_then(|c| c.follow.as_mut())
            .ok_or(SyncError::NotConnected)?;
        follow
            .view
            .changed()
            .await
            .map_err(|_| SyncError::Transport("subscription closed".into()))?;
        Ok(self.state())
    }

    /// A followed game is already drawn, so registration is closed.
    fn ensure_local(&self) -> Result<(), SyncError> {
        if self.is_following() {
            return Err(SantaError::AlreadyDrawn.into());
        }
        Ok(())
    }

    pub fn add_participant(&mut self, name: &str, photo_url: &str) -> Result<AppState, SyncError> {
        self.ensure_local()?;
        Ok(self.santa.add_participant(name, photo_url)?.clone())
    }

    pub fn remove_participant(&mut self, id: &str) -> Result<AppState, SyncError> {
        self.ensure_local()?;
        Ok(self.santa.remove_participant(id)?.clone())
    }

    pub fn load_demo(&mut self) -> Result<AppState, SyncError> {
        self.ensure_local()?;
        Ok(self.santa.load_demo()?.clone())
    }

    /// Draws with a seeded generator when `seed` is given. A new draw
    /// detaches from any remote document published earlier.
    pub fn start_draw(&mut self, seed: Option<u64>) -> Result<AppState, SyncError> {
        self.ensure_local()?;
        let mut rng = seed
            .map(ChaCha8Rng::seed_from_u64)
            .unwrap_or_else(ChaCha8Rng::from_entropy);
        let state = self.santa.start_draw(&mut rng)?.clone();
        if self.cloud.take().is_some() {
            info!("redraw detaches from published game");
        }
        Ok(state)
    }

    pub fn select_giver(&self, giver_id: &str) -> Result<(Participant, Participant), SyncError> {
        let state = self.state();
        let (giver, receiver) = actions::select_giver(&state, giver_id)?;
        Ok((giver.clone(), receiver.clone()))
    }

    /// Marks `participant_id` as having seen their match. Following viewers
    /// write to the shared document; local viewers save locally first and
    /// then mirror outward if the game was published.
    pub async fn reveal(&mut self, participant_id: &str) -> Result<AppState, SyncError> {
        match &self.cloud {
            Some(cloud) if cloud.follow.is_some() => {
                if self.state().participant(participant_id).is_none() {
                    return Err(SantaError::ParticipantNotFound(participant_id.to_string()).into());
                }
                cloud
                    .remote
                    .mark_revealed(&cloud.game_id, participant_id)
                    .await?;
                Ok(self.state())
            }
            Some(cloud) => {
                self.santa.mark_revealed(participant_id)?;
                cloud
                    .remote
                    .mark_revealed(&cloud.game_id, participant_id)
                    .await?;
                Ok(self.santa.state().clone())
            }
            None => Ok(self.santa.mark_revealed(participant_id)?.clone()),
        }
    }

    fn remote_config(&self) -> Option<RemoteConfig> {
        self.env_config
            .clone()
            .or_else(|| self.santa.state().remote_config.clone())
    }

    /// Keeps a pasted descriptor for publishing and later loads.
    pub fn save_remote_config(&mut self, pasted: &str) -> Result<RemoteConfig, SyncError> {
        Ok(self.santa.save_remote_config(pasted)?)
    }

    /// Uploads the drawn game and returns its short link.
    pub async fn publish(&mut self, base_url: &str) -> Result<String, SyncError> {
        if let Some(cloud) = &self.cloud {
            return Ok(cloud_link(base_url, &cloud.game_id)?);
        }
        if !self.santa.state().is_setup {
            return Err(SantaError::NotDrawn.into());
        }
        let config = self.remote_config().ok_or(SyncError::NotConnected)?;
        // Bad base addresses fail before anything is uploaded.
        cloud_link(base_url, "")?;
        let remote = (self.connect)(&config)?;
        let game_id = remote.create(self.santa.state()).await?;
        self.santa.set_game_id(game_id.clone())?;
        info!(%game_id, "game published");

        let link = cloud_link(base_url, &game_id)?;
        self.cloud = Some(CloudLink {
            game_id,
            remote,
            follow: None,
        });
        Ok(link)
    }

    /// Long link carrying the whole draw, for use without a remote store.
    pub fn offline_link(&self, base_url: &str) -> Result<String, SyncError> {
        Ok(offline_link(base_url, &self.state())?)
    }

    pub fn reset(&mut self) -> Result<AppState, SyncError> {
        self.cloud = None;
        Ok(self.santa.reset()?.clone())
    }

    /// Releases the push subscription, if any.
    pub fn close(mut self) {
        if let Some(follow) = self.cloud.take().and_then(|c| c.follow) {
            follow.subscription.cancel();
        }
    }
}
