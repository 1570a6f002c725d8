use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use santa_core::AppState;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::documents::DocumentStore;
use crate::error::SyncError;
use crate::remote::RemoteStore;

pub fn app(store: DocumentStore) -> Router {
    // Leave room above the document limit so oversized games reach the
    // size check and get a descriptive refusal.
    let body_limit = store.max_document_bytes().saturating_mul(4);
    Router::new()
        .route("/games", post(create_game))
        .route("/games/:id", get(get_game))
        .route("/games/:id/participants/:participant_id/reveal", post(reveal))
        .route("/ws/games/:id", get(ws_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(store)
}

#[derive(Serialize, Deserialize)]
pub(crate) struct CreateGameResponse {
    pub(crate) game_id: String,
}

async fn create_game(
    State(store): State<DocumentStore>,
    Json(state): Json<AppState>,
) -> impl IntoResponse {
    if !state.is_setup || state.assignments.is_empty() {
        return (StatusCode::BAD_REQUEST, "draw has not run yet").into_response();
    }
    match store.create(&state).await {
        Ok(game_id) => (StatusCode::CREATED, Json(CreateGameResponse { game_id })).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn get_game(
    State(store): State<DocumentStore>,
    Path(game_id): Path<String>,
) -> impl IntoResponse {
    match store.fetch(&game_id).await {
        Ok(document) => (StatusCode::OK, Json(document)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn reveal(
    State(store): State<DocumentStore>,
    Path((game_id, participant_id)): Path<(String, String)>,
) -> Result<StatusCode, SyncError> {
    store.mark_revealed(&game_id, &participant_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(store): State<DocumentStore>,
    Path(game_id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, store, game_id))
}

async fn handle_socket(stream: WebSocket, store: DocumentStore, game_id: String) {
    let (mut sender, mut receiver) = stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let subscription = match store
        .subscribe(&game_id, move |document| {
            let _ = tx.send(document);
        })
        .await
    {
        Ok(subscription) => subscription,
        Err(err) => {
            let _ = sender.send(Message::Text(format!("error:{err}"))).await;
            return;
        }
    };

    let mut send_task = tokio::spawn(async move {
        while let Some(document) = rx.recv().await {
            let text = match serde_json::to_string(&document) {
                Ok(text) => text,
                Err(err) => {
                    warn!("cannot encode document: {err}");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Clients only listen; anything but a close is ignored.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    debug!(%game_id, "socket closed");
    subscription.cancel();
}
