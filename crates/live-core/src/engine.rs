//! The polling engine.
//!
//! A single periodic loop drives one round per enabled platform per tick.
//! Platforms are polled concurrently within a tick; per-platform state sits
//! behind its own mutex so a round is the only writer of its tracker. A tick
//! firing while the previous one is still running is dropped, not queued.
//! No round failure stops the loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use rand::Rng;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::auth::CredentialCache;
use crate::config::PollerConfig;
use crate::error::PollError;
use crate::notify::{Dispatcher, NotificationMeta};
use crate::platform::PlatformPoller;
use crate::presence::PresenceTracker;
use crate::render::{offline_message, render_live, DEFAULT_TEMPLATE};
use crate::status::{ChannelPresence, PlatformStatus, StatusBoard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Active,
    Stopping,
    Stopped,
}

impl EngineState {
    pub fn can_transition_to(self, target: EngineState) -> bool {
        matches!(
            (self, target),
            (EngineState::Idle, EngineState::Active)
                | (EngineState::Active, EngineState::Stopping)
                | (EngineState::Stopping, EngineState::Stopped)
                | (EngineState::Stopped, EngineState::Active)
        )
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Active => write!(f, "active"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// One enabled platform with its configured streamers.
pub struct PlatformUnit {
    pub poller: Arc<dyn PlatformPoller>,
    pub streamers: Vec<String>,
}

struct UnitState {
    tracker: PresenceTracker,
    consecutive_failures: u32,
}

struct Unit {
    poller: Arc<dyn PlatformPoller>,
    state: Mutex<UnitState>,
}

pub struct Notifier {
    config: PollerConfig,
    template: String,
    credentials: Arc<CredentialCache>,
    units: Arc<Vec<Unit>>,
    dispatcher: Arc<Dispatcher>,
    board: StatusBoard,
    state: Arc<RwLock<EngineState>>,
    round_in_flight: Arc<AtomicBool>,
    last_tick: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl Notifier {
    pub fn new(
        config: PollerConfig,
        credentials: CredentialCache,
        platforms: Vec<PlatformUnit>,
        dispatcher: Dispatcher,
    ) -> Self {
        let units = platforms
            .into_iter()
            .map(|p| {
                let platform = p.poller.platform();
                Unit {
                    poller: p.poller,
                    state: Mutex::new(UnitState {
                        tracker: PresenceTracker::new(platform, p.streamers),
                        consecutive_failures: 0,
                    }),
                }
            })
            .collect();

        Self {
            config,
            template: DEFAULT_TEMPLATE.to_string(),
            credentials: Arc::new(credentials),
            units: Arc::new(units),
            dispatcher: Arc::new(dispatcher),
            board: StatusBoard::new(),
            state: Arc::new(RwLock::new(EngineState::Idle)),
            round_in_flight: Arc::new(AtomicBool::new(false)),
            last_tick: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn board(&self) -> StatusBoard {
        self.board.clone()
    }

    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }

    pub async fn last_tick(&self) -> Option<DateTime<Utc>> {
        *self.last_tick.read().await
    }

    /// Start the periodic loop. Idempotent while already active.
    pub async fn start(&self) {
        {
            let mut state = self.state.write().await;
            if *state == EngineState::Active {
                return;
            }
            *state = EngineState::Active;
        }

        info!(
            platforms = self.units.len(),
            destinations = self.dispatcher.len(),
            interval_ms = self.config.poll_interval.as_millis() as u64,
            "Starting notifier"
        );
        if self.dispatcher.is_empty() {
            warn!("No notification destinations configured, transitions will only be logged");
        }

        let state = Arc::clone(&self.state);
        let units = Arc::clone(&self.units);
        let credentials = Arc::clone(&self.credentials);
        let dispatcher = Arc::clone(&self.dispatcher);
        let board = self.board.clone();
        let template = self.template.clone();
        let round_in_flight = Arc::clone(&self.round_in_flight);
        let last_tick = Arc::clone(&self.last_tick);
        let base_ms = self.config.poll_interval.as_millis() as u64;

        tokio::spawn(async move {
            loop {
                {
                    let current = *state.read().await;
                    if current != EngineState::Active {
                        let mut s = state.write().await;
                        *s = EngineState::Stopped;
                        info!("Notifier stopped");
                        break;
                    }
                }

                run_tick(
                    &units,
                    &credentials,
                    &dispatcher,
                    &template,
                    &board,
                    &round_in_flight,
                    &last_tick,
                )
                .await;

                // Jitter the sleep so rounds do not align with other clients.
                let jitter_range = base_ms / 7;
                let jitter = if jitter_range > 0 {
                    rand::thread_rng().gen_range(0..jitter_range * 2) as i64 - jitter_range as i64
                } else {
                    0
                };
                let sleep_ms = (base_ms as i64 + jitter).max(1) as u64;
                tokio::time::sleep(tokio::time::Duration::from_millis(sleep_ms)).await;
            }
        });
    }

    /// Request a stop; the in-flight round is allowed to finish.
    pub async fn stop(&self) {
        let mut state = self.state.write().await;
        if *state == EngineState::Active {
            *state = EngineState::Stopping;
            info!("Stopping notifier");
        }
    }

    /// Run a single tick. Used by tests and the one-shot CLI mode; shares
    /// the in-flight guard with the periodic loop, so an overlapping call
    /// is dropped.
    pub async fn poll_once(&self) {
        run_tick(
            &self.units,
            &self.credentials,
            &self.dispatcher,
            &self.template,
            &self.board,
            &self.round_in_flight,
            &self.last_tick,
        )
        .await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_tick(
    units: &[Unit],
    credentials: &CredentialCache,
    dispatcher: &Dispatcher,
    template: &str,
    board: &StatusBoard,
    round_in_flight: &AtomicBool,
    last_tick: &RwLock<Option<DateTime<Utc>>>,
) {
    if round_in_flight.swap(true, Ordering::SeqCst) {
        warn!("Previous round still in flight, dropping this tick");
        return;
    }

    *last_tick.write().await = Some(Utc::now());

    let rounds = units
        .iter()
        .map(|unit| run_platform_round(unit, credentials, dispatcher, template, board));
    join_all(rounds).await;

    round_in_flight.store(false, Ordering::SeqCst);
}

async fn run_platform_round(
    unit: &Unit,
    credentials: &CredentialCache,
    dispatcher: &Dispatcher,
    template: &str,
    board: &StatusBoard,
) {
    let platform = unit.poller.platform();
    let mut state = unit.state.lock().await;

    let channels: Vec<String> = state.tracker.channels().to_vec();
    if channels.is_empty() {
        return;
    }

    let credential = match credentials.get_valid(platform).await {
        Ok(c) => c,
        Err(e) => {
            warn!(%platform, error = %e, "No valid credential, skipping round");
            record_failed_round(&mut state, board);
            return;
        }
    };

    let snapshot = match unit.poller.poll(&channels, &credential).await {
        Ok(s) => s,
        Err(PollError::AuthRejected) => {
            warn!(%platform, "Platform rejected credential, re-authenticating next round");
            credentials.invalidate(platform).await;
            record_failed_round(&mut state, board);
            return;
        }
        Err(e) => {
            warn!(%platform, error = %e, "Platform poll failed, keeping previous state");
            record_failed_round(&mut state, board);
            return;
        }
    };

    let transitions = state.tracker.diff(&snapshot);
    state.consecutive_failures = 0;
    board.record_round(platform_status(&state.tracker, 0));

    for transition in transitions {
        board.record_transition(transition.kind);
        info!(
            platform = %transition.platform,
            channel = %transition.channel,
            status = %transition.kind,
            "Presence transition"
        );

        let message = match &transition.snapshot {
            Some(snap) => render_live(template, snap),
            None => offline_message(transition.platform, &transition.channel),
        };
        let meta = NotificationMeta::from_transition(&transition);
        let outcomes = dispatcher.broadcast(&message, &meta).await;
        let failed = outcomes.iter().filter(|o| !o.is_ok()).count() as u64;
        if failed > 0 {
            board.record_delivery_failures(failed);
        }
    }
}

fn record_failed_round(state: &mut UnitState, board: &StatusBoard) {
    state.consecutive_failures = state.consecutive_failures.saturating_add(1);
    board.record_round(platform_status(&state.tracker, state.consecutive_failures));
}

fn platform_status(tracker: &PresenceTracker, consecutive_failures: u32) -> PlatformStatus {
    PlatformStatus {
        platform: tracker.platform(),
        last_round: Some(Utc::now()),
        consecutive_failures,
        channels: tracker
            .channels()
            .iter()
            .map(|c| ChannelPresence {
                channel: c.clone(),
                is_live: tracker.is_live(c),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::auth::Credential;
    use crate::platform::{ChannelSnapshot, Platform, PollSnapshot};

    #[test]
    fn valid_state_transitions() {
        assert!(EngineState::Idle.can_transition_to(EngineState::Active));
        assert!(EngineState::Active.can_transition_to(EngineState::Stopping));
        assert!(EngineState::Stopping.can_transition_to(EngineState::Stopped));
        assert!(EngineState::Stopped.can_transition_to(EngineState::Active));
    }

    #[test]
    fn invalid_state_transitions() {
        assert!(!EngineState::Idle.can_transition_to(EngineState::Stopped));
        assert!(!EngineState::Active.can_transition_to(EngineState::Idle));
        assert!(!EngineState::Stopping.can_transition_to(EngineState::Active));
    }

    struct SlowPoller {
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    #[async_trait]
    impl PlatformPoller for SlowPoller {
        fn platform(&self) -> Platform {
            Platform::Twitch
        }

        async fn poll(
            &self,
            streamers: &[String],
            _credential: &Credential,
        ) -> Result<PollSnapshot, PollError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let mut snap = PollSnapshot::default();
            for s in streamers {
                snap.insert(ChannelSnapshot::offline(Platform::Twitch, s.clone()));
            }
            Ok(snap)
        }
    }

    fn seeded_credentials() -> CredentialCache {
        CredentialCache::new(reqwest::Client::new(), &PollerConfig::default(), vec![])
            .with_credential(Credential {
                platform: Platform::Twitch,
                access_token: "tok".into(),
                expires_at: Utc::now() + chrono::Duration::hours(1),
            })
    }

    #[tokio::test]
    async fn overlapping_tick_is_dropped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let notifier = Arc::new(Notifier::new(
            PollerConfig::default(),
            seeded_credentials(),
            vec![PlatformUnit {
                poller: Arc::new(SlowPoller {
                    calls: calls.clone(),
                    delay: Duration::from_millis(200),
                }),
                streamers: vec!["foo".to_string()],
            }],
            Dispatcher::new(vec![]),
        ));

        let slow = tokio::spawn({
            let notifier = notifier.clone();
            async move { notifier.poll_once().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        notifier.poll_once().await;
        slow.await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_round_leaves_presence_untouched() {
        struct FailingPoller;

        #[async_trait]
        impl PlatformPoller for FailingPoller {
            fn platform(&self) -> Platform {
                Platform::Twitch
            }

            async fn poll(
                &self,
                _streamers: &[String],
                _credential: &Credential,
            ) -> Result<PollSnapshot, PollError> {
                Err(PollError::Http {
                    url: "https://api.example".into(),
                    status: 500,
                })
            }
        }

        let notifier = Notifier::new(
            PollerConfig::default(),
            seeded_credentials(),
            vec![PlatformUnit {
                poller: Arc::new(FailingPoller),
                streamers: vec!["foo".to_string()],
            }],
            Dispatcher::new(vec![]),
        );

        notifier.poll_once().await;
        let board = notifier.board();
        assert_eq!(board.rounds_total(), 1);
        assert_eq!(board.went_live_total(), 0);
        assert_eq!(board.platforms()[0].consecutive_failures, 1);
    }
}
