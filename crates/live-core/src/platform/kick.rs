//! Kick adapter: the public API has no batch query, so channels are fetched
//! one request per streamer with bounded concurrency. A 404 (or an empty
//! data array) is a confirmed "channel unknown, offline"; transient errors
//! leave the channel indeterminate for this round; a 401 aborts the whole
//! platform round so the next tick re-authenticates.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::header;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::Credential;
use crate::error::PollError;

use super::{ChannelSnapshot, Platform, PlatformPoller, PollSnapshot};

pub const KICK_CHANNELS_URL: &str = "https://api.kick.com/public/v1/channels";

// The public endpoint refuses requests without a client-looking user agent.
const KICK_USER_AGENT: &str =
    "KICK/1.0.13 Dalvik/2.1.0 (Linux; U; Android 13; Pixel 6 Pro Build/TQ1A.221205.011)";

pub struct KickPoller {
    client: Client,
    base_url: String,
    max_concurrent: usize,
}

impl KickPoller {
    pub fn new(client: Client, max_concurrent: usize) -> Self {
        Self {
            client,
            base_url: KICK_CHANNELS_URL.to_string(),
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn fetch_channel(
        &self,
        token: &str,
        slug: &str,
    ) -> Result<Option<KickChannel>, PollError> {
        let url = format!("{}?slug={}", self.base_url, slug);
        let resp = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .header(header::USER_AGENT, KICK_USER_AGENT)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| PollError::from_reqwest(&url, e))?;

        match resp.status().as_u16() {
            401 => Err(PollError::AuthRejected),
            404 => Ok(None),
            status if !resp.status().is_success() => Err(PollError::Http { url, status }),
            _ => {
                let body: ChannelsResponse = resp
                    .json()
                    .await
                    .map_err(|e| PollError::from_reqwest(&url, e))?;
                Ok(body.data.into_iter().next())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChannelsResponse {
    #[serde(default)]
    data: Vec<KickChannel>,
}

#[derive(Debug, Deserialize)]
struct KickChannel {
    #[serde(default)]
    stream_title: String,
    category: Option<KickCategory>,
    stream: Option<KickStream>,
}

#[derive(Debug, Deserialize)]
struct KickCategory {
    name: String,
}

#[derive(Debug, Deserialize)]
struct KickStream {
    #[serde(default)]
    is_live: bool,
    #[serde(default)]
    viewer_count: u64,
    #[serde(default)]
    thumbnail: String,
}

impl KickChannel {
    fn into_snapshot(self, channel: &str) -> ChannelSnapshot {
        let stream = match self.stream {
            Some(s) if s.is_live => s,
            _ => return ChannelSnapshot::offline(Platform::Kick, channel),
        };

        let category = self
            .category
            .map(|c| c.name)
            .or_else(|| {
                if self.stream_title.is_empty() {
                    None
                } else {
                    Some(self.stream_title)
                }
            });

        ChannelSnapshot {
            platform: Platform::Kick,
            channel: channel.to_string(),
            is_live: true,
            display_name: channel.to_string(),
            category,
            viewer_count: Some(stream.viewer_count),
            thumbnail_url: if stream.thumbnail.is_empty() {
                None
            } else {
                Some(stream.thumbnail)
            },
            canonical_url: Platform::Kick.channel_url(channel),
        }
    }
}

#[async_trait]
impl PlatformPoller for KickPoller {
    fn platform(&self) -> Platform {
        Platform::Kick
    }

    async fn poll(
        &self,
        streamers: &[String],
        credential: &Credential,
    ) -> Result<PollSnapshot, PollError> {
        let mut fetches = Vec::with_capacity(streamers.len());
        for slug in streamers {
            let slug = slug.as_str();
            fetches.push(async move {
                let result = self.fetch_channel(&credential.access_token, slug).await;
                (slug, result)
            });
        }
        let results: Vec<_> = stream::iter(fetches)
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut snapshot = PollSnapshot::default();
        for (slug, result) in results {
            match result {
                Ok(Some(channel)) => {
                    let snap = channel.into_snapshot(slug);
                    debug!(channel = slug, is_live = snap.is_live, "Kick channel resolved");
                    snapshot.insert(snap);
                }
                Ok(None) => {
                    warn!(channel = slug, "Kick channel not found, treating as offline");
                    snapshot.insert(ChannelSnapshot::offline(Platform::Kick, slug));
                }
                Err(PollError::AuthRejected) => return Err(PollError::AuthRejected),
                Err(e) => {
                    warn!(channel = slug, error = %e, "Kick query failed, status unknown this round");
                    snapshot.mark_indeterminate(slug);
                }
            }
        }
        Ok(snapshot)
    }
}
