//! Hosted game documents for shared Secret Santa draws, and the client
//! session that decides at load whether to follow one.

pub mod config;
pub mod documents;
mod error;
pub mod http_remote;
pub mod remote;
mod routes;
pub mod session;

pub use config::ServerConfig;
pub use documents::DocumentStore;
pub use error::SyncError;
pub use http_remote::HttpRemote;
pub use remote::{RemoteDocument, RemoteStore, Subscription, DEFAULT_MAX_DOCUMENT_BYTES};
pub use routes::app;
pub use session::Session;
