//! Read-mostly status published by the engine and consumed by the HTTP API.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::platform::Platform;
use crate::presence::TransitionKind;

#[derive(Debug, Clone, Serialize)]
pub struct ChannelPresence {
    pub channel: String,
    pub is_live: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformStatus {
    pub platform: Platform,
    pub last_round: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub channels: Vec<ChannelPresence>,
}

/// Shared, cheaply clonable view of the engine's current state.
#[derive(Clone, Default)]
pub struct StatusBoard {
    platforms: Arc<DashMap<Platform, PlatformStatus>>,
    rounds_total: Arc<AtomicU64>,
    went_live_total: Arc<AtomicU64>,
    went_offline_total: Arc<AtomicU64>,
    delivery_failures_total: Arc<AtomicU64>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_round(&self, status: PlatformStatus) {
        self.rounds_total.fetch_add(1, Ordering::Relaxed);
        self.platforms.insert(status.platform, status);
    }

    pub fn record_transition(&self, kind: TransitionKind) {
        match kind {
            TransitionKind::WentLive => self.went_live_total.fetch_add(1, Ordering::Relaxed),
            TransitionKind::WentOffline => self.went_offline_total.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn record_delivery_failures(&self, count: u64) {
        self.delivery_failures_total
            .fetch_add(count, Ordering::Relaxed);
    }

    /// All platform statuses, ordered by platform name for stable output.
    pub fn platforms(&self) -> Vec<PlatformStatus> {
        let mut out: Vec<PlatformStatus> =
            self.platforms.iter().map(|e| e.value().clone()).collect();
        out.sort_by_key(|s| s.platform.display_name());
        out
    }

    pub fn rounds_total(&self) -> u64 {
        self.rounds_total.load(Ordering::Relaxed)
    }

    pub fn went_live_total(&self) -> u64 {
        self.went_live_total.load(Ordering::Relaxed)
    }

    pub fn went_offline_total(&self) -> u64 {
        self.went_offline_total.load(Ordering::Relaxed)
    }

    pub fn delivery_failures_total(&self) -> u64 {
        self.delivery_failures_total.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_and_transitions_accumulate() {
        let board = StatusBoard::new();
        board.record_round(PlatformStatus {
            platform: Platform::Twitch,
            last_round: Some(Utc::now()),
            consecutive_failures: 0,
            channels: vec![],
        });
        board.record_transition(TransitionKind::WentLive);
        board.record_transition(TransitionKind::WentLive);
        board.record_transition(TransitionKind::WentOffline);
        board.record_delivery_failures(2);

        assert_eq!(board.rounds_total(), 1);
        assert_eq!(board.went_live_total(), 2);
        assert_eq!(board.went_offline_total(), 1);
        assert_eq!(board.delivery_failures_total(), 2);
    }

    #[test]
    fn latest_round_replaces_platform_entry() {
        let board = StatusBoard::new();
        for failures in [1u32, 0] {
            board.record_round(PlatformStatus {
                platform: Platform::Kick,
                last_round: Some(Utc::now()),
                consecutive_failures: failures,
                channels: vec![ChannelPresence {
                    channel: "baz".into(),
                    is_live: failures == 0,
                }],
            });
        }
        let platforms = board.platforms();
        assert_eq!(platforms.len(), 1);
        assert_eq!(platforms[0].consecutive_failures, 0);
        assert!(platforms[0].channels[0].is_live);
    }

    #[test]
    fn platform_listing_is_sorted() {
        let board = StatusBoard::new();
        for platform in [Platform::Twitch, Platform::Kick] {
            board.record_round(PlatformStatus {
                platform,
                last_round: None,
                consecutive_failures: 0,
                channels: vec![],
            });
        }
        let names: Vec<_> = board
            .platforms()
            .iter()
            .map(|s| s.platform.display_name())
            .collect();
        assert_eq!(names, vec!["Kick", "Twitch"]);
    }
}
