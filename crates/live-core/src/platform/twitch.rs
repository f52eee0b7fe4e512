//! Twitch adapter: one batched Helix query covers all configured streamers.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::auth::Credential;
use crate::error::PollError;

use super::{ChannelSnapshot, Platform, PlatformPoller, PollSnapshot};

pub const HELIX_STREAMS_URL: &str = "https://api.twitch.tv/helix/streams";

pub struct TwitchPoller {
    client: Client,
    client_id: String,
    base_url: String,
}

impl TwitchPoller {
    pub fn new(client: Client, client_id: impl Into<String>) -> Self {
        Self {
            client,
            client_id: client_id.into(),
            base_url: HELIX_STREAMS_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct StreamsResponse {
    #[serde(default)]
    data: Vec<HelixStream>,
}

#[derive(Debug, Deserialize)]
struct HelixStream {
    user_login: String,
    #[serde(default)]
    user_name: String,
    #[serde(default)]
    game_name: String,
    #[serde(default)]
    viewer_count: u64,
    #[serde(default)]
    thumbnail_url: String,
}

/// Helix thumbnail URLs carry literal `{width}`/`{height}` placeholders.
fn expand_thumbnail(url: &str) -> String {
    url.replace("{width}", "320").replace("{height}", "180")
}

fn none_if_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[async_trait]
impl PlatformPoller for TwitchPoller {
    fn platform(&self) -> Platform {
        Platform::Twitch
    }

    async fn poll(
        &self,
        streamers: &[String],
        credential: &Credential,
    ) -> Result<PollSnapshot, PollError> {
        let query: Vec<(&str, &str)> = streamers
            .iter()
            .map(|s| ("user_login", s.as_str()))
            .collect();

        let resp = self
            .client
            .get(&self.base_url)
            .header("Client-ID", &self.client_id)
            .bearer_auth(&credential.access_token)
            .query(&query)
            .send()
            .await
            .map_err(|e| PollError::from_reqwest(&self.base_url, e))?;

        let status = resp.status();
        if status.as_u16() == 401 {
            return Err(PollError::AuthRejected);
        }
        if !status.is_success() {
            return Err(PollError::Http {
                url: self.base_url.clone(),
                status: status.as_u16(),
            });
        }

        let body: StreamsResponse = resp
            .json()
            .await
            .map_err(|e| PollError::from_reqwest(&self.base_url, e))?;

        // Helix only returns active streams; configured channels absent from
        // the response are confirmed offline.
        let mut snapshot = PollSnapshot::default();
        for stream in body.data {
            let channel = streamers
                .iter()
                .find(|s| s.eq_ignore_ascii_case(&stream.user_login))
                .cloned()
                .unwrap_or_else(|| stream.user_login.clone());

            debug!(channel = %channel, viewers = stream.viewer_count, "Twitch reports live");
            let display_name = if stream.user_name.is_empty() {
                channel.clone()
            } else {
                stream.user_name
            };
            snapshot.insert(ChannelSnapshot {
                platform: Platform::Twitch,
                canonical_url: Platform::Twitch.channel_url(&stream.user_login),
                channel,
                is_live: true,
                display_name,
                category: none_if_empty(stream.game_name),
                viewer_count: Some(stream.viewer_count),
                thumbnail_url: none_if_empty(stream.thumbnail_url)
                    .map(|u| expand_thumbnail(&u)),
            });
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credential() -> Credential {
        Credential {
            platform: Platform::Twitch,
            access_token: "tok".into(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        }
    }

    fn poller(server: &MockServer) -> TwitchPoller {
        TwitchPoller::new(Client::new(), "cid")
            .with_base_url(format!("{}/helix/streams", server.uri()))
    }

    fn live_entry(login: &str, viewers: u64) -> serde_json::Value {
        serde_json::json!({
            "user_login": login,
            "user_name": login.to_uppercase(),
            "game_name": "Tetris",
            "viewer_count": viewers,
            "thumbnail_url": "https://cdn.example/{width}x{height}.jpg",
            "type": "live"
        })
    }

    #[test]
    fn thumbnail_placeholders_expand() {
        assert_eq!(
            expand_thumbnail("https://x/{width}x{height}.jpg"),
            "https://x/320x180.jpg"
        );
    }

    #[tokio::test]
    async fn batched_poll_marks_absent_channels_offline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/helix/streams"))
            .and(header("Client-ID", "cid"))
            .and(query_param("user_login", "foo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [live_entry("foo", 42)]
            })))
            .mount(&server)
            .await;

        let streamers = vec!["foo".to_string(), "bar".to_string()];
        let snap = poller(&server).poll(&streamers, &credential()).await.unwrap();

        assert!(snap.is_live("foo"));
        assert!(!snap.is_live("bar"));
        assert!(snap.indeterminate.is_empty());
        let foo = &snap.channels["foo"];
        assert_eq!(foo.viewer_count, Some(42));
        assert_eq!(foo.category.as_deref(), Some("Tetris"));
        assert_eq!(
            foo.thumbnail_url.as_deref(),
            Some("https://cdn.example/320x180.jpg")
        );
        assert_eq!(foo.canonical_url, "https://www.twitch.tv/foo");
    }

    #[tokio::test]
    async fn response_login_casing_maps_to_configured_spelling() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [live_entry("foobar", 7)]
            })))
            .mount(&server)
            .await;

        let streamers = vec!["FooBar".to_string()];
        let snap = poller(&server).poll(&streamers, &credential()).await.unwrap();
        assert!(snap.is_live("FooBar"));
    }

    #[tokio::test]
    async fn unauthorized_maps_to_auth_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let streamers = vec!["foo".to_string()];
        let err = poller(&server)
            .poll(&streamers, &credential())
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::AuthRejected));
    }

    #[tokio::test]
    async fn gateway_timeout_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(504))
            .mount(&server)
            .await;

        let streamers = vec!["foo".to_string()];
        let err = poller(&server)
            .poll(&streamers, &credential())
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.status_code(), Some(504));
    }
}
