//! Notification fan-out.
//!
//! Every configured destination receives each rendered message. Sends run
//! concurrently and are awaited as a batch, so shutdown and tests observe
//! completion deterministically. A failing destination is logged and never
//! blocks its siblings; nothing is retried.

pub mod discord;
pub mod telegram;

pub use discord::DiscordDestination;
pub use telegram::TelegramDestination;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::NotifyError;
use crate::platform::Platform;
use crate::presence::{Transition, TransitionKind};

/// Structured context handed to destinations alongside the rendered message.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationMeta {
    pub platform: Platform,
    pub kind: TransitionKind,
    pub channel: String,
    pub viewer_count: Option<u64>,
    pub url: String,
}

impl NotificationMeta {
    pub fn from_transition(transition: &Transition) -> Self {
        Self {
            platform: transition.platform,
            kind: transition.kind,
            channel: transition.channel.clone(),
            viewer_count: transition
                .snapshot
                .as_ref()
                .and_then(|s| s.viewer_count),
            url: transition.channel_url(),
        }
    }
}

/// A configured downstream messaging sink.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Stable label for logs and delivery outcomes. Must not leak secrets.
    fn label(&self) -> String;

    async fn send(&self, message: &str, meta: &NotificationMeta) -> Result<(), NotifyError>;
}

#[derive(Debug)]
pub struct DeliveryOutcome {
    pub destination: String,
    pub result: Result<(), NotifyError>,
}

impl DeliveryOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Fan-out over all configured destinations.
pub struct Dispatcher {
    destinations: Vec<Box<dyn Destination>>,
}

impl Dispatcher {
    pub fn new(destinations: Vec<Box<dyn Destination>>) -> Self {
        Self { destinations }
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// Deliver one message to every destination, concurrently, and wait for
    /// all outcomes. Zero destinations is a no-op, not an error.
    pub async fn broadcast(
        &self,
        message: &str,
        meta: &NotificationMeta,
    ) -> Vec<DeliveryOutcome> {
        let sends = self.destinations.iter().map(|destination| async move {
            let label = destination.label();
            let result = destination.send(message, meta).await;
            match &result {
                Ok(()) => info!(
                    destination = %label,
                    platform = %meta.platform,
                    status = %meta.kind,
                    channel = %meta.channel,
                    url = %meta.url,
                    "Notification delivered"
                ),
                Err(e) => warn!(
                    destination = %label,
                    platform = %meta.platform,
                    channel = %meta.channel,
                    error = %e,
                    "Notification delivery failed"
                ),
            }
            DeliveryOutcome {
                destination: label,
                result,
            }
        });
        futures::future::join_all(sends).await
    }
}
