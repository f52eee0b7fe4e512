//! Message rendering. Pure string substitution, safe to share across
//! concurrent transitions.

use crate::platform::{ChannelSnapshot, Platform};

pub const DEFAULT_TEMPLATE: &str = "🟢 Platform: *{platform}*\n👤 Streamer: *{user_name}*\n🎮 Currently playing: *{game_name}*\n👀 Viewers: *{viewer_count}*\n\n🔴 [Watch here]({user_url})";

/// Substitute the template placeholders from a live snapshot.
///
/// Optional fields fall back to their documented defaults; placeholders the
/// template uses but this renderer does not know stay literal.
pub fn render_live(template: &str, snapshot: &ChannelSnapshot) -> String {
    let viewer_count = snapshot
        .viewer_count
        .map(|v| v.to_string())
        .unwrap_or_else(|| "0".to_string());

    template
        .replace("{platform}", snapshot.platform.display_name())
        .replace("{user_name}", &snapshot.display_name)
        .replace("{game_name}", snapshot.category.as_deref().unwrap_or("Unknown"))
        .replace("{viewer_count}", &viewer_count)
        .replace(
            "{thumbnail_url}",
            snapshot.thumbnail_url.as_deref().unwrap_or(""),
        )
        .replace("{user_url}", &snapshot.canonical_url)
}

pub fn offline_message(platform: Platform, channel: &str) -> String {
    format!(
        "🔴 {} streamer *{}* is now offline.",
        platform.display_name(),
        channel
    )
}
