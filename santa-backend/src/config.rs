use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::warn;

use crate::remote::DEFAULT_MAX_DOCUMENT_BYTES;

const DEFAULT_BIND: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub persist_path: Option<PathBuf>,
    pub max_document_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            persist_path: None,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

impl ServerConfig {
    /// `SANTA_BIND`, `PERSIST_PATH`, `SANTA_MAX_DOCUMENT_BYTES`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind = match lookup("SANTA_BIND") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(%raw, "bad SANTA_BIND, using {DEFAULT_BIND}");
                default_bind()
            }),
            None => default_bind(),
        };
        let max_document_bytes = match lookup("SANTA_MAX_DOCUMENT_BYTES") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(%raw, "bad SANTA_MAX_DOCUMENT_BYTES, using default");
                DEFAULT_MAX_DOCUMENT_BYTES
            }),
            None => DEFAULT_MAX_DOCUMENT_BYTES,
        };
        Self {
            bind,
            persist_path: lookup("PERSIST_PATH")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            max_document_bytes,
        }
    }
}
