#![forbid(unsafe_code)]

pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod notify;
pub mod platform;
pub mod presence;
pub mod render;
pub mod status;

pub use auth::{Credential, CredentialCache, OauthApp};
pub use config::{build_http_client, PollerConfig};
pub use engine::{EngineState, Notifier, PlatformUnit};
pub use error::{AuthError, NotifyError, PollError};
pub use notify::{
    DeliveryOutcome, Destination, DiscordDestination, Dispatcher, NotificationMeta,
    TelegramDestination,
};
pub use platform::{
    ChannelSnapshot, KickPoller, Platform, PlatformPoller, PollSnapshot, TwitchPoller,
};
pub use presence::{PresenceTracker, Transition, TransitionKind};
pub use render::{offline_message, render_live, DEFAULT_TEMPLATE};
pub use status::{ChannelPresence, PlatformStatus, StatusBoard};
