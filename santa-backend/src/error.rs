use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use santa_core::SantaError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("game payload is {size} bytes, over the {limit} byte limit; use fewer or smaller photos")]
    PayloadTooLarge { size: usize, limit: usize },
    #[error("game not found")]
    GameNotFound,
    #[error("participant not found")]
    ParticipantNotFound,
    #[error("no remote configuration available")]
    NotConnected,
    #[error("transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Core(#[from] SantaError),
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = match &self {
            SyncError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            SyncError::GameNotFound | SyncError::ParticipantNotFound => StatusCode::NOT_FOUND,
            SyncError::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
            SyncError::Transport(_) => StatusCode::BAD_GATEWAY,
            SyncError::Core(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}
