//! `RemoteStore` over the network: plain HTTP for reads and writes, a
//! WebSocket for pushes. Talks to the routes served by [`crate::app`].

use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use santa_core::{AppState, RemoteConfig};
use serde::de::DeserializeOwned;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::SyncError;
use crate::remote::{RemoteDocument, RemoteStore, Subscription, DEFAULT_MAX_DOCUMENT_BYTES};
use crate::routes::CreateGameResponse;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct HttpRemote {
    agent: ureq::Agent,
    base: Url,
    max_document_bytes: usize,
}

impl HttpRemote {
    /// Points at the service named by the descriptor's `authDomain`.
    pub fn connect(config: &RemoteConfig) -> Result<Self, SyncError> {
        config.validate()?;
        let base = config.endpoint()?;
        info!(project = %config.project_id, endpoint = %base, "remote connected");
        Ok(Self {
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
            base,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        })
    }

    pub fn with_limit(mut self, max_document_bytes: usize) -> Self {
        self.max_document_bytes = max_document_bytes;
        self
    }

    fn url(&self, segments: &[&str]) -> Result<Url, SyncError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::Transport(format!("{} cannot take a path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// ureq blocks, so every request runs on the blocking pool.
    async fn call<T, F>(&self, request: F) -> Result<T, SyncError>
    where
        F: FnOnce(&ureq::Agent) -> Result<T, SyncError> + Send + 'static,
        T: Send + 'static,
    {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || request(&agent))
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))?
    }
}

fn request_error(err: ureq::Error) -> SyncError {
    match err {
        ureq::Error::Status(404, response) => {
            let body = response.into_string().unwrap_or_default();
            if body == SyncError::ParticipantNotFound.to_string() {
                SyncError::ParticipantNotFound
            } else {
                SyncError::GameNotFound
            }
        }
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            SyncError::Transport(format!("server answered {code}: {body}"))
        }
        ureq::Error::Transport(err) => SyncError::Transport(err.to_string()),
    }
}

fn read_json<T: DeserializeOwned>(response: ureq::Response) -> Result<T, SyncError> {
    response
        .into_json()
        .map_err(|err| SyncError::Transport(format!("bad response body: {err}")))
}

impl RemoteStore for HttpRemote {
    async fn create(&self, state: &AppState) -> Result<String, SyncError> {
        let size = RemoteDocument::from_state(state, Utc::now()).encoded_len()?;
        if size > self.max_document_bytes {
            warn!(size, limit = self.max_document_bytes, "game refused, too large");
            return Err(SyncError::PayloadTooLarge {
                size,
                limit: self.max_document_bytes,
            });
        }

        // The descriptor and any old id stay on this device.
        let body = AppState {
            game_id: None,
            remote_config: None,
            ..state.clone()
        };
        let url = self.url(&["games"])?;
        let created: CreateGameResponse = self
            .call(move |agent| {
                let response = agent
                    .post(url.as_str())
                    .send_json(&body)
                    .map_err(request_error)?;
                read_json(response)
            })
            .await?;
        info!(game_id = %created.game_id, size, "game uploaded");
        Ok(created.game_id)
    }

    async fn fetch(&self, game_id: &str) -> Result<RemoteDocument, SyncError> {
        let url = self.url(&["games", game_id])?;
        self.call(move |agent| {
            let response = agent.get(url.as_str()).call().map_err(request_error)?;
            read_json(response)
        })
        .await
    }

    async fn subscribe<F>(&self, game_id: &str, on_update: F) -> Result<Subscription, SyncError>
    where
        F: Fn(RemoteDocument) + Send + 'static,
    {
        let mut url = self.url(&["ws", "games", game_id])?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| SyncError::Transport(format!("cannot use {scheme} for {url}")))?;

        let (mut socket, _response) = connect_async(url.as_str())
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))?;

        // The server answers with the snapshot first, or an `error:` line.
        let first = match socket.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(other)) => {
                return Err(SyncError::Transport(format!("unexpected frame: {other:?}")))
            }
            Some(Err(err)) => return Err(SyncError::Transport(err.to_string())),
            None => return Err(SyncError::Transport("socket closed".into())),
        };
        if let Some(reason) = first.strip_prefix("error:") {
            return Err(if reason == SyncError::GameNotFound.to_string() {
                SyncError::GameNotFound
            } else {
                SyncError::Transport(reason.to_string())
            });
        }
        let snapshot: RemoteDocument =
            serde_json::from_str(&first).map_err(|err| SyncError::Core(err.into()))?;

        let id = game_id.to_string();
        let task = tokio::spawn(async move {
            on_update(snapshot);
            while let Some(message) = socket.next().await {
                match message {
                    Ok(Message::Text(text)) => match serde_json::from_str(&text) {
                        Ok(document) => on_update(document),
                        Err(err) => warn!(game_id = %id, "ignoring undecodable push: {err}"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!(game_id = %id, "push stream failed: {err}");
                        break;
                    }
                }
            }
            debug!(game_id = %id, "push stream ended");
        });
        info!(%game_id, "subscribed");
        Ok(Subscription::new(game_id, task))
    }

    async fn mark_revealed(&self, game_id: &str, participant_id: &str) -> Result<(), SyncError> {
        let url = self.url(&["games", game_id, "participants", participant_id, "reveal"])?;
        self.call(move |agent| {
            agent.post(url.as_str()).call().map_err(request_error)?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::DocumentStore;
    use crate::routes::app;
    use crate::session::Session;
    use santa_core::{assign_cycle, LaunchUrl, MemoryStore, Participant, SantaError};
    use tokio::sync::mpsc;

    fn drawn(names: &[&str]) -> AppState {
        let participants: Vec<Participant> = names
            .iter()
            .enumerate()
            .map(|(i, name)| Participant {
                id: (i + 1).to_string(),
                name: name.to_string(),
                photo_url: String::new(),
                is_revealed: false,
            })
            .collect();
        let ids: Vec<String> = participants.iter().map(|p| p.id.clone()).collect();
        AppState {
            participants,
            assignments: assign_cycle(&ids),
            is_setup: true,
            ..AppState::default()
        }
    }

    /// Serves `store` on an ephemeral port and returns a descriptor for it.
    async fn serve(store: DocumentStore) -> RemoteConfig {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app(store)).await.unwrap() });
        RemoteConfig {
            api_key: "k".into(),
            project_id: "p".into(),
            auth_domain: format!("http://{addr}"),
            ..RemoteConfig::default()
        }
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<RemoteDocument>) -> RemoteDocument {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("update in time")
            .expect("channel open")
    }

    #[tokio::test]
    async fn create_fetch_and_reveal_over_http() {
        let store = DocumentStore::default();
        let remote = HttpRemote::connect(&serve(store.clone()).await).unwrap();

        let mut state = drawn(&["Ana", "Caro", "Lu"]);
        state.game_id = Some("old".into());
        let id = remote.create(&state).await.unwrap();
        let hosted = store.fetch(&id).await.unwrap();
        assert_eq!(hosted.participants, state.participants);
        assert_eq!(remote.fetch(&id).await.unwrap(), hosted);

        remote.mark_revealed(&id, "2").await.unwrap();
        let revealed: Vec<bool> = store
            .fetch(&id)
            .await
            .unwrap()
            .participants
            .iter()
            .map(|p| p.is_revealed)
            .collect();
        assert_eq!(revealed, [false, true, false]);

        assert!(matches!(remote.fetch("missing").await, Err(SyncError::GameNotFound)));
        assert!(matches!(
            remote.mark_revealed("missing", "1").await,
            Err(SyncError::GameNotFound)
        ));
        assert!(matches!(
            remote.mark_revealed(&id, "9").await,
            Err(SyncError::ParticipantNotFound)
        ));
    }

    #[tokio::test]
    async fn oversized_game_never_leaves_the_client() {
        let store = DocumentStore::default();
        let remote = HttpRemote::connect(&serve(store.clone()).await).unwrap();
        let mut state = drawn(&["Ana", "Caro"]);
        state.participants[0].photo_url =
            format!("data:image/jpeg;base64,{}", "A".repeat(1_200_000));
        assert!(matches!(
            remote.create(&state).await,
            Err(SyncError::PayloadTooLarge { limit: 900_000, .. })
        ));
        assert_eq!(store.game_count().await, 0);
    }

    #[tokio::test]
    async fn socket_delivers_snapshot_then_changes() {
        let store = DocumentStore::default();
        let remote = HttpRemote::connect(&serve(store.clone()).await).unwrap();
        let id = store.create(&drawn(&["Ana", "Caro"])).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = remote
            .subscribe(&id, move |doc| {
                let _ = tx.send(doc);
            })
            .await
            .unwrap();
        assert!(next(&mut rx).await.participants.iter().all(|p| !p.is_revealed));

        store.mark_revealed(&id, "1").await.unwrap();
        assert!(next(&mut rx).await.participants[0].is_revealed);

        subscription.cancel();
        assert!(matches!(
            remote.subscribe("ghost", |_| {}).await,
            Err(SyncError::GameNotFound)
        ));
    }

    #[tokio::test]
    async fn connect_needs_a_reachable_domain() {
        let config = RemoteConfig {
            api_key: "k".into(),
            project_id: "p".into(),
            ..RemoteConfig::default()
        };
        assert!(matches!(
            HttpRemote::connect(&config),
            Err(SyncError::Core(SantaError::InvalidConfig(_)))
        ));
        let remote = HttpRemote::connect(&RemoteConfig {
            auth_domain: "http://127.0.0.1:1".into(),
            ..config
        })
        .unwrap();
        assert!(matches!(
            remote.fetch("g1").await,
            Err(SyncError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn sessions_share_a_game_over_the_network() {
        let store = DocumentStore::default();
        let config = serve(store.clone()).await;

        let mut host = Session::start(
            &LaunchUrl::default(),
            MemoryStore::new(),
            Some(config.clone()),
            HttpRemote::connect,
        )
        .await
        .unwrap();
        for name in ["Ana", "Caro", "Lu"] {
            host.add_participant(name, "").unwrap();
        }
        let drawn = host.start_draw(Some(5)).unwrap();
        let link = host.publish("https://santa.example/").await.unwrap();

        let mut viewer = Session::start(
            &LaunchUrl::parse(&link),
            MemoryStore::new(),
            Some(config),
            HttpRemote::connect,
        )
        .await
        .unwrap();
        assert!(viewer.is_following());

        let lu = drawn.participants[2].id.clone();
        host.reveal(&lu).await.unwrap();
        let seen = loop {
            let state = viewer.state();
            if state.participants.get(2).is_some_and(|p| p.is_revealed) {
                break state;
            }
            tokio::time::timeout(Duration::from_secs(2), viewer.changed())
                .await
                .expect("update in time")
                .unwrap();
        };
        assert_eq!(seen.assignments, drawn.assignments);
        viewer.close();
    }
}
