//! Edge-triggered presence diffing.
//!
//! The tracker holds the last known live flag per configured channel and
//! turns a round's [`PollSnapshot`] into transitions. Comparing against the
//! stored flag before mutating it guarantees strict alternation: a channel
//! never produces two consecutive went-live (or went-offline) transitions.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::platform::{ChannelSnapshot, Platform, PollSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    WentLive,
    WentOffline,
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WentLive => write!(f, "online"),
            Self::WentOffline => write!(f, "offline"),
        }
    }
}

/// One observed status edge. Produced and consumed within a single round.
#[derive(Debug, Clone)]
pub struct Transition {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub platform: Platform,
    pub channel: String,
    pub kind: TransitionKind,
    /// Display metadata, present only for went-live transitions.
    pub snapshot: Option<ChannelSnapshot>,
}

impl Transition {
    fn went_live(snapshot: ChannelSnapshot) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            platform: snapshot.platform,
            channel: snapshot.channel.clone(),
            kind: TransitionKind::WentLive,
            snapshot: Some(snapshot),
        }
    }

    fn went_offline(platform: Platform, channel: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            platform,
            channel,
            kind: TransitionKind::WentOffline,
            snapshot: None,
        }
    }

    /// Canonical channel URL, taken from the snapshot when present.
    pub fn channel_url(&self) -> String {
        self.snapshot
            .as_ref()
            .map(|s| s.canonical_url.clone())
            .unwrap_or_else(|| self.platform.channel_url(&self.channel))
    }
}

/// Last-known live state for one platform's configured channels.
///
/// State is memory-resident only: a restart resets every channel to offline,
/// so a channel already live at restart produces one spurious went-live on
/// the first round.
pub struct PresenceTracker {
    platform: Platform,
    channels: Vec<String>,
    last_live: HashMap<String, bool>,
}

impl PresenceTracker {
    pub fn new(platform: Platform, channels: Vec<String>) -> Self {
        Self {
            platform,
            channels,
            last_live: HashMap::new(),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Configured channels, in configuration order.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn is_live(&self, channel: &str) -> bool {
        self.last_live.get(channel).copied().unwrap_or(false)
    }

    /// Compute the transitions between the last round and `poll`.
    ///
    /// Transitions come out in configuration order regardless of how the
    /// adapter ordered its response. Channels the adapter marked
    /// indeterminate are skipped entirely: no state change, no transition.
    pub fn diff(&mut self, poll: &PollSnapshot) -> Vec<Transition> {
        let mut transitions = Vec::new();

        for channel in &self.channels {
            if poll.is_indeterminate(channel) {
                continue;
            }
            let was_live = self.last_live.get(channel).copied().unwrap_or(false);

            match poll.channels.get(channel) {
                Some(snap) if snap.is_live => {
                    if !was_live {
                        transitions.push(Transition::went_live(snap.clone()));
                        self.last_live.insert(channel.clone(), true);
                    }
                }
                _ => {
                    // Absent or explicitly not live: confirmed offline.
                    if was_live {
                        transitions
                            .push(Transition::went_offline(self.platform, channel.clone()));
                        self.last_live.insert(channel.clone(), false);
                    }
                }
            }
        }
        transitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(channel: &str) -> ChannelSnapshot {
        ChannelSnapshot {
            platform: Platform::Twitch,
            channel: channel.to_string(),
            is_live: true,
            display_name: channel.to_string(),
            category: Some("Tetris".into()),
            viewer_count: Some(10),
            thumbnail_url: None,
            canonical_url: Platform::Twitch.channel_url(channel),
        }
    }

    fn poll_with(live_channels: &[&str]) -> PollSnapshot {
        let mut poll = PollSnapshot::default();
        for c in live_channels {
            poll.insert(live(c));
        }
        poll
    }

    fn tracker(channels: &[&str]) -> PresenceTracker {
        PresenceTracker::new(
            Platform::Twitch,
            channels.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn first_live_round_emits_one_went_live() {
        let mut t = tracker(&["foo"]);
        let transitions = t.diff(&poll_with(&["foo"]));
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].kind, TransitionKind::WentLive);
        assert_eq!(transitions[0].channel, "foo");
        assert!(transitions[0].snapshot.is_some());
    }

    #[test]
    fn repeated_live_rounds_are_idempotent() {
        let mut t = tracker(&["foo"]);
        assert_eq!(t.diff(&poll_with(&["foo"])).len(), 1);
        assert_eq!(t.diff(&poll_with(&["foo"])).len(), 0);
        assert_eq!(t.diff(&poll_with(&["foo"])).len(), 0);
    }

    #[test]
    fn absent_after_live_emits_went_offline_once() {
        // bar live on rounds 1-3, absent on round 4.
        let mut t = tracker(&["bar"]);
        t.diff(&poll_with(&["bar"]));
        t.diff(&poll_with(&["bar"]));
        t.diff(&poll_with(&["bar"]));
        let transitions = t.diff(&poll_with(&[]));
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].kind, TransitionKind::WentOffline);
        assert!(transitions[0].snapshot.is_none());
        assert_eq!(t.diff(&poll_with(&[])).len(), 0);
    }

    #[test]
    fn transitions_strictly_alternate() {
        let mut t = tracker(&["foo"]);
        let mut kinds = Vec::new();
        let rounds = [
            poll_with(&["foo"]),
            poll_with(&["foo"]),
            poll_with(&[]),
            poll_with(&[]),
            poll_with(&["foo"]),
            poll_with(&[]),
        ];
        for round in &rounds {
            kinds.extend(t.diff(round).into_iter().map(|tr| tr.kind));
        }
        assert_eq!(
            kinds,
            vec![
                TransitionKind::WentLive,
                TransitionKind::WentOffline,
                TransitionKind::WentLive,
                TransitionKind::WentOffline,
            ]
        );
    }

    #[test]
    fn offline_to_absent_never_duplicates_offline() {
        // A channel that was never live stays silent when confirmed offline.
        let mut t = tracker(&["baz"]);
        let mut poll = PollSnapshot::default();
        poll.insert(ChannelSnapshot::offline(Platform::Twitch, "baz"));
        assert!(t.diff(&poll).is_empty());
        assert!(t.diff(&poll_with(&[])).is_empty());
    }

    #[test]
    fn indeterminate_channels_keep_their_state() {
        let mut t = tracker(&["foo"]);
        t.diff(&poll_with(&["foo"]));

        let mut poll = PollSnapshot::default();
        poll.mark_indeterminate("foo");
        assert!(t.diff(&poll).is_empty());
        assert!(t.is_live("foo"));

        // Once the channel resolves offline, exactly one transition fires.
        let transitions = t.diff(&poll_with(&[]));
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].kind, TransitionKind::WentOffline);
    }

    #[test]
    fn output_follows_configuration_order() {
        let mut t = tracker(&["a", "b", "c"]);
        // Insertion order of the snapshot map must not matter.
        let mut poll = PollSnapshot::default();
        poll.insert(live("c"));
        poll.insert(live("a"));
        poll.insert(live("b"));
        let channels: Vec<_> = t.diff(&poll).into_iter().map(|tr| tr.channel).collect();
        assert_eq!(channels, vec!["a", "b", "c"]);
    }

    #[test]
    fn fresh_tracker_reports_already_live_channel_once() {
        // Restart semantics: state resets, so one spurious went-live fires.
        let mut t = tracker(&["foo"]);
        assert_eq!(t.diff(&poll_with(&["foo"])).len(), 1);

        let mut restarted = tracker(&["foo"]);
        assert_eq!(restarted.diff(&poll_with(&["foo"])).len(), 1);
        assert_eq!(restarted.diff(&poll_with(&["foo"])).len(), 0);
    }

    #[test]
    fn offline_transition_still_has_channel_url() {
        let mut t = tracker(&["foo"]);
        t.diff(&poll_with(&["foo"]));
        let transitions = t.diff(&poll_with(&[]));
        assert_eq!(transitions[0].channel_url(), "https://www.twitch.tv/foo");
    }
}
