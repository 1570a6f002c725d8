//! Connection descriptor for the shared remote document store.

use std::env;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Result, SantaError};

const ENV_FIELDS: [&str; 6] = [
    "SANTA_REMOTE_API_KEY",
    "SANTA_REMOTE_AUTH_DOMAIN",
    "SANTA_REMOTE_PROJECT_ID",
    "SANTA_REMOTE_STORAGE_BUCKET",
    "SANTA_REMOTE_MESSAGING_SENDER_ID",
    "SANTA_REMOTE_APP_ID",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    pub api_key: String,
    #[serde(default)]
    pub auth_domain: String,
    pub project_id: String,
    #[serde(default)]
    pub storage_bucket: String,
    #[serde(default)]
    pub messaging_sender_id: String,
    #[serde(default)]
    pub app_id: String,
}

impl RemoteConfig {
    /// Reads the six `SANTA_REMOTE_*` variables. Returns `None` unless all
    /// of them are set and non-empty.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values = Vec::with_capacity(ENV_FIELDS.len());
        for key in ENV_FIELDS {
            let value = lookup(key).filter(|v| !v.trim().is_empty())?;
            values.push(value);
        }
        let mut values = values.into_iter();
        let mut next = || values.next().unwrap_or_default();
        Some(Self {
            api_key: next(),
            auth_domain: next(),
            project_id: next(),
            storage_bucket: next(),
            messaging_sender_id: next(),
            app_id: next(),
        })
    }

    /// Parses a descriptor pasted by a user. Accepts the bare JSON object or
    /// the snippet form `const someConfig = { ... };`.
    pub fn parse_pasted(text: &str) -> Result<Self> {
        let mut body = text.trim();
        if let Some(rest) = body.strip_prefix("const ") {
            body = rest
                .split_once('=')
                .map(|(_, value)| value)
                .ok_or_else(|| SantaError::InvalidConfig("missing '='".into()))?;
        }
        let body = body.trim().trim_end_matches(';').trim();

        let config: RemoteConfig = serde_json::from_str(body)
            .map_err(|e| SantaError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(SantaError::InvalidConfig("apiKey required".into()));
        }
        if self.project_id.trim().is_empty() {
            return Err(SantaError::InvalidConfig("projectId required".into()));
        }
        Ok(())
    }

    /// Base address of the document service. `authDomain` may be a bare
    /// host (served over https) or a full http(s) origin.
    pub fn endpoint(&self) -> Result<Url> {
        let domain = self.auth_domain.trim();
        if domain.is_empty() {
            return Err(SantaError::InvalidConfig("authDomain required".into()));
        }
        let url = if domain.contains("://") {
            Url::parse(domain)?
        } else {
            Url::parse(&format!("https://{domain}/"))?
        };
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(SantaError::InvalidConfig(format!(
                "unsupported scheme {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn env_lookup_requires_all_six() {
        let mut vars: HashMap<&str, String> = ENV_FIELDS
            .iter()
            .map(|k| (*k, format!("value-{k}")))
            .collect();
        let config = RemoteConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.api_key, "value-SANTA_REMOTE_API_KEY");
        assert_eq!(config.app_id, "value-SANTA_REMOTE_APP_ID");

        vars.insert("SANTA_REMOTE_APP_ID", "  ".into());
        assert!(RemoteConfig::from_lookup(|k| vars.get(k).cloned()).is_none());
        vars.remove("SANTA_REMOTE_APP_ID");
        assert!(RemoteConfig::from_lookup(|k| vars.get(k).cloned()).is_none());
    }

    #[test]
    fn pasted_json_object() {
        let config = RemoteConfig::parse_pasted(
            r#"{ "apiKey": "k", "authDomain": "a", "projectId": "p", "storageBucket": "s", "messagingSenderId": "m", "appId": "i" }"#,
        )
        .unwrap();
        assert_eq!(config.project_id, "p");
        assert_eq!(config.messaging_sender_id, "m");
    }

    #[test]
    fn pasted_snippet_with_declaration() {
        let text = "const firebaseConfig = {\n  \"apiKey\": \"k\",\n  \"projectId\": \"p\"\n};";
        let config = RemoteConfig::parse_pasted(text).unwrap();
        assert_eq!(config.api_key, "k");
        assert_eq!(config.project_id, "p");
        assert!(config.app_id.is_empty());
    }

    #[test]
    fn pasted_garbage_or_missing_keys_rejected() {
        assert!(matches!(
            RemoteConfig::parse_pasted("not json"),
            Err(SantaError::InvalidConfig(_))
        ));
        assert!(matches!(
            RemoteConfig::parse_pasted(r#"{ "apiKey": "", "projectId": "p" }"#),
            Err(SantaError::InvalidConfig(_))
        ));
        assert!(matches!(
            RemoteConfig::parse_pasted(r#"{ "apiKey": "k" }"#),
            Err(SantaError::InvalidConfig(_))
        ));
    }

    #[test]
    fn endpoint_from_auth_domain() {
        let mut config = RemoteConfig {
            api_key: "k".into(),
            project_id: "p".into(),
            auth_domain: "santa.example".into(),
            ..RemoteConfig::default()
        };
        assert_eq!(config.endpoint().unwrap().as_str(), "https://santa.example/");

        config.auth_domain = "http://127.0.0.1:8080".into();
        assert_eq!(config.endpoint().unwrap().as_str(), "http://127.0.0.1:8080/");

        config.auth_domain = "ftp://santa.example".into();
        assert!(matches!(config.endpoint(), Err(SantaError::InvalidConfig(_))));
        config.auth_domain = " ".into();
        assert!(matches!(config.endpoint(), Err(SantaError::InvalidConfig(_))));
        config.auth_domain = "bad host".into();
        assert!(matches!(config.endpoint(), Err(SantaError::Url(_))));
    }
}
