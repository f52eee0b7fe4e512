use thiserror::Error;

use crate::platform::Platform;

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("token exchange for {platform} failed after {attempts} attempts: {reason}")]
    ExchangeFailed {
        platform: Platform,
        attempts: u32,
        reason: String,
    },
    #[error("token endpoint rejected {platform} client credentials: HTTP {status}")]
    Rejected { platform: Platform, status: u16 },
    #[error("no client credentials configured for {platform}")]
    NotConfigured { platform: Platform },
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },
    #[error("network error calling {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    /// The platform rejected the bearer token on a data query (401).
    #[error("platform rejected credential")]
    AuthRejected,
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl PollError {
    pub fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Network {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }

    /// True for failures that say nothing about a channel's actual status.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout { .. } | Self::Http { .. }
        )
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::AuthRejected => Some(401),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("HTTP {status} from {destination}")]
    Http { destination: String, status: u16 },
    #[error("request to {destination} failed: {reason}")]
    Network { destination: String, reason: String },
}
