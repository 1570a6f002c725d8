use thiserror::Error;

use crate::ParticipantId;

#[derive(Debug, Error)]
pub enum SantaError {
    #[error("at least two participants are needed for the draw")]
    NotEnoughParticipants,
    #[error("participant name required")]
    EmptyName,
    #[error("participant not found: {0}")]
    ParticipantNotFound(ParticipantId),
    #[error("participant {0} already revealed")]
    AlreadyRevealed(ParticipantId),
    #[error("no assignment for participant {0}")]
    MissingAssignment(ParticipantId),
    #[error("draw has not run yet")]
    NotDrawn,
    #[error("draw already ran; reset to change participants")]
    AlreadyDrawn,
    #[error("invalid remote configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SantaError>;
