//! OAuth client-credentials lifecycle.
//!
//! Each platform that requires a bearer token gets one cached credential.
//! [`CredentialCache::get_valid`] exchanges, caches, and refreshes tokens;
//! a 401 observed on a data query is reported back via
//! [`CredentialCache::invalidate`] so the next round re-authenticates.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::PollerConfig;
use crate::error::AuthError;
use crate::platform::Platform;

pub const TWITCH_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
pub const KICK_TOKEN_URL: &str = "https://id.kick.com/oauth/token";

/// Callers blocked behind a failed exchange observe that failure instead of
/// immediately starting another; the next tick retries fresh.
const FAILURE_COOLDOWN: Duration = Duration::from_secs(1);

/// A bearer token for one platform. `expires_at` already has the safety
/// margin subtracted, so any credential handed out is good for at least that
/// margin at the moment of issuance.
#[derive(Debug, Clone)]
pub struct Credential {
    pub platform: Platform,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn is_fresh(&self) -> bool {
        self.expires_at > Utc::now()
    }
}

/// Registered client credentials for one platform's token endpoint.
#[derive(Debug, Clone)]
pub struct OauthApp {
    pub platform: Platform,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
}

impl OauthApp {
    pub fn twitch(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            platform: Platform::Twitch,
            token_url: TWITCH_TOKEN_URL.to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn kick(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            platform: Platform::Kick,
            token_url: KICK_TOKEN_URL.to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Default)]
struct Slot {
    credential: Option<Credential>,
    last_failure: Option<Instant>,
}

struct Entry {
    app: OauthApp,
    slot: Mutex<Slot>,
}

/// Per-platform token acquisition and caching.
///
/// The slot mutex is held across the whole exchange, so concurrent
/// `get_valid` calls for one platform never race two exchanges: the second
/// caller waits and then reuses the refreshed credential, or sees the
/// recorded failure.
pub struct CredentialCache {
    client: Client,
    retries: u32,
    backoff: Duration,
    safety_margin: Duration,
    request_timeout: Duration,
    entries: HashMap<Platform, Entry>,
}

impl CredentialCache {
    pub fn new(client: Client, config: &PollerConfig, apps: Vec<OauthApp>) -> Self {
        let entries = apps
            .into_iter()
            .map(|app| {
                (
                    app.platform,
                    Entry {
                        app,
                        slot: Mutex::new(Slot::default()),
                    },
                )
            })
            .collect();
        Self {
            client,
            retries: config.token_retries.max(1),
            backoff: config.token_retry_backoff,
            safety_margin: config.token_safety_margin,
            request_timeout: config.request_timeout,
            entries,
        }
    }

    /// Seed a pre-provisioned credential (long-lived tokens, tests).
    pub fn with_credential(mut self, credential: Credential) -> Self {
        let platform = credential.platform;
        let entry = self.entries.entry(platform).or_insert_with(|| Entry {
            app: OauthApp {
                platform,
                token_url: String::new(),
                client_id: String::new(),
                client_secret: String::new(),
            },
            slot: Mutex::new(Slot::default()),
        });
        entry.slot = Mutex::new(Slot {
            credential: Some(credential),
            last_failure: None,
        });
        self
    }

    /// Return a credential with at least the safety margin remaining,
    /// exchanging a fresh one if the cached token is missing or expired.
    pub async fn get_valid(&self, platform: Platform) -> Result<Credential, AuthError> {
        let entry = self
            .entries
            .get(&platform)
            .ok_or(AuthError::NotConfigured { platform })?;

        let mut slot = entry.slot.lock().await;

        if let Some(cred) = &slot.credential {
            if cred.is_fresh() {
                return Ok(cred.clone());
            }
        }

        if let Some(at) = slot.last_failure {
            if at.elapsed() < FAILURE_COOLDOWN {
                return Err(AuthError::ExchangeFailed {
                    platform,
                    attempts: 0,
                    reason: "previous exchange just failed".into(),
                });
            }
        }

        match self.exchange(&entry.app).await {
            Ok(cred) => {
                slot.credential = Some(cred.clone());
                slot.last_failure = None;
                Ok(cred)
            }
            Err(e) => {
                // Keep any stale credential in place; it is never handed out
                // alongside a failure, but the slot state stays intact.
                slot.last_failure = Some(Instant::now());
                Err(e)
            }
        }
    }

    /// Drop the cached credential so the next `get_valid` re-authenticates.
    pub async fn invalidate(&self, platform: Platform) {
        if let Some(entry) = self.entries.get(&platform) {
            let mut slot = entry.slot.lock().await;
            slot.credential = None;
            debug!(%platform, "Cached credential invalidated");
        }
    }

    async fn exchange(&self, app: &OauthApp) -> Result<Credential, AuthError> {
        let mut last_reason = String::new();

        for attempt in 1..=self.retries {
            if attempt > 1 {
                let backoff = self.backoff * (attempt - 1);
                debug!(
                    platform = %app.platform,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "Retrying token exchange"
                );
                tokio::time::sleep(backoff).await;
            }

            let result = self
                .client
                .post(&app.token_url)
                .form(&[
                    ("client_id", app.client_id.as_str()),
                    ("client_secret", app.client_secret.as_str()),
                    ("grant_type", "client_credentials"),
                ])
                .timeout(self.request_timeout)
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => match resp.json::<TokenResponse>().await {
                    Ok(token) => {
                        let ttl = chrono::Duration::seconds(token.expires_in as i64);
                        let margin =
                            chrono::Duration::milliseconds(self.safety_margin.as_millis() as i64);
                        return Ok(Credential {
                            platform: app.platform,
                            access_token: token.access_token,
                            expires_at: Utc::now() + ttl - margin,
                        });
                    }
                    Err(e) => {
                        last_reason = format!("malformed token response: {e}");
                    }
                },
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    // Bad client id/secret is not going to fix itself by retrying.
                    if (400..500).contains(&status) && status != 429 {
                        return Err(AuthError::Rejected {
                            platform: app.platform,
                            status,
                        });
                    }
                    warn!(platform = %app.platform, status, attempt, "Token endpoint error");
                    last_reason = format!("HTTP {status}");
                }
                Err(e) => {
                    warn!(platform = %app.platform, attempt, error = %e, "Token exchange network error");
                    last_reason = e.to_string();
                }
            }
        }

        Err(AuthError::ExchangeFailed {
            platform: app.platform,
            attempts: self.retries,
            reason: last_reason,
        })
    }
}
