pub mod kick;
pub mod twitch;

pub use kick::KickPoller;
pub use twitch::TwitchPoller;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::Credential;
use crate::error::PollError;

/// A supported streaming platform. The set is closed and resolved at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Twitch,
    Kick,
}

impl Platform {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Twitch => "Twitch",
            Self::Kick => "Kick",
        }
    }

    /// Lowercase identifier, matching the serialized form.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Twitch => "twitch",
            Self::Kick => "kick",
        }
    }

    /// Canonical channel page URL for a channel on this platform.
    pub fn channel_url(self, channel: &str) -> String {
        match self {
            Self::Twitch => format!("https://www.twitch.tv/{channel}"),
            Self::Kick => format!("https://kick.com/{channel}"),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// The status of one channel as observed by a single poll.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelSnapshot {
    pub platform: Platform,
    pub channel: String,
    pub is_live: bool,
    pub display_name: String,
    pub category: Option<String>,
    pub viewer_count: Option<u64>,
    pub thumbnail_url: Option<String>,
    pub canonical_url: String,
}

impl ChannelSnapshot {
    /// A confirmed-offline snapshot with no display metadata.
    pub fn offline(platform: Platform, channel: impl Into<String>) -> Self {
        let channel = channel.into();
        let canonical_url = platform.channel_url(&channel);
        Self {
            platform,
            display_name: channel.clone(),
            channel,
            is_live: false,
            category: None,
            viewer_count: None,
            thumbnail_url: None,
            canonical_url,
        }
    }
}

/// One platform round's resolved channel statuses.
///
/// A configured channel absent from `channels` and not listed in
/// `indeterminate` is confirmed offline. Channels in `indeterminate` failed
/// with a transient error this round; their previous state must be preserved.
#[derive(Debug, Clone, Default)]
pub struct PollSnapshot {
    pub channels: HashMap<String, ChannelSnapshot>,
    pub indeterminate: Vec<String>,
}

impl PollSnapshot {
    pub fn insert(&mut self, snapshot: ChannelSnapshot) {
        self.channels.insert(snapshot.channel.clone(), snapshot);
    }

    pub fn mark_indeterminate(&mut self, channel: impl Into<String>) {
        self.indeterminate.push(channel.into());
    }

    pub fn is_indeterminate(&self, channel: &str) -> bool {
        self.indeterminate.iter().any(|c| c == channel)
    }

    pub fn is_live(&self, channel: &str) -> bool {
        self.channels.get(channel).is_some_and(|s| s.is_live)
    }
}

/// One platform's data-query capability.
///
/// Implementations query the platform API once per call and normalize the
/// result. Object-safe and Send + Sync for use across async tasks.
#[async_trait]
pub trait PlatformPoller: Send + Sync {
    fn platform(&self) -> Platform;

    /// Query the current status of the given channels with a valid credential.
    async fn poll(
        &self,
        streamers: &[String],
        credential: &Credential,
    ) -> Result<PollSnapshot, PollError>;
}
