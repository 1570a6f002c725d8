//! Share links.
//!
//! Cloud form: `<base>?id=<game id>`. Offline form: `<base>#g=<token>`.

use url::{form_urlencoded, Url};

use crate::codec::{encode_payload, SharePayload};
use crate::{AppState, Result};

const CLOUD_PARAM: &str = "id";
const FRAGMENT_PARAM: &str = "g";

fn base_url(base: &str) -> Result<Url> {
    let mut url = Url::parse(base)?;
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

pub fn cloud_link(base: &str, game_id: &str) -> Result<String> {
    let mut url = base_url(base)?;
    url.query_pairs_mut().append_pair(CLOUD_PARAM, game_id);
    Ok(url.into())
}

pub fn offline_link(base: &str, state: &AppState) -> Result<String> {
    let token = encode_payload(&SharePayload::from_state(state))?;
    let mut url = base_url(base)?;
    let fragment: String = form_urlencoded::Serializer::new(String::new())
        .append_pair(FRAGMENT_PARAM, &token)
        .finish();
    url.set_fragment(Some(&fragment));
    Ok(url.into())
}

/// The parts of the address the app was opened with that matter at load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchUrl {
    pub game_id: Option<String>,
    pub fragment_token: Option<String>,
}

impl LaunchUrl {
    /// An address that does not parse carries nothing.
    pub fn parse(address: &str) -> Self {
        let Ok(url) = Url::parse(address) else {
            return Self::default();
        };
        Self {
            game_id: find(url.query_pairs(), CLOUD_PARAM),
            fragment_token: url
                .fragment()
                .and_then(|f| find(form_urlencoded::parse(f.as_bytes()), FRAGMENT_PARAM)),
        }
    }
}

fn find(pairs: form_urlencoded::Parse<'_>, key: &str) -> Option<String> {
    pairs
        .into_iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_payload;

    #[test]
    fn cloud_link_round_trip() {
        let link = cloud_link("https://santa.example/app/", "abc123").unwrap();
        assert_eq!(link, "https://santa.example/app/?id=abc123");
        let launch = LaunchUrl::parse(&link);
        assert_eq!(launch.game_id.as_deref(), Some("abc123"));
        assert!(launch.fragment_token.is_none());
    }

    #[test]
    fn cloud_link_escapes_reserved_characters() {
        let link = cloud_link("https://x.test/?old=1#g=stale", "a&b c#d").unwrap();
        assert_eq!(link, "https://x.test/?id=a%26b+c%23d");
        assert_eq!(LaunchUrl::parse(&link).game_id.as_deref(), Some("a&b c#d"));
    }

    #[test]
    fn percent_encoded_id_is_decoded() {
        let launch = LaunchUrl::parse("https://x.test/?id=abc%2D123");
        assert_eq!(launch.game_id.as_deref(), Some("abc-123"));
    }

    #[test]
    fn offline_link_carries_payload() {
        let mut state = AppState::default();
        state.participants.push(crate::Participant {
            id: "1".into(),
            name: "Ana & Lu #1".into(),
            photo_url: String::new(),
            is_revealed: true,
        });
        let link = offline_link("https://santa.example/?id=old#g=stale", &state).unwrap();
        assert!(link.starts_with("https://santa.example/#g="));

        let launch = LaunchUrl::parse(&link);
        assert!(launch.game_id.is_none());
        let payload = decode_payload(launch.fragment_token.as_deref().unwrap()).unwrap();
        assert_eq!(payload.participants[0].name, "Ana & Lu #1");
    }

    #[test]
    fn both_parts_and_extra_params() {
        let launch = LaunchUrl::parse("https://x.test/?lang=es&id=g1#foo=bar&g=tok");
        assert_eq!(launch.game_id.as_deref(), Some("g1"));
        assert_eq!(launch.fragment_token.as_deref(), Some("tok"));
    }

    #[test]
    fn bare_or_broken_address_has_nothing() {
        assert_eq!(LaunchUrl::parse("https://x.test/"), LaunchUrl::default());
        assert_eq!(LaunchUrl::parse("https://x.test/?id=#g="), LaunchUrl::default());
        assert_eq!(LaunchUrl::parse("not a url ?id=g1"), LaunchUrl::default());
    }

    #[test]
    fn bad_base_is_an_error() {
        assert!(cloud_link("no scheme here", "g1").is_err());
        assert!(offline_link("", &AppState::default()).is_err());
    }
}
