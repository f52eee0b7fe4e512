use std::fmt::Write;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::state::AppState;

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut out = String::with_capacity(2048);
    let platforms = state.board.platforms();

    writeln!(out, "# TYPE live_notifier_rounds counter").unwrap();
    writeln!(out, "# HELP live_notifier_rounds Total polling rounds run").unwrap();
    writeln!(
        out,
        "live_notifier_rounds_total {}",
        state.board.rounds_total()
    )
    .unwrap();

    writeln!(out, "# TYPE live_notifier_transitions counter").unwrap();
    writeln!(
        out,
        "# HELP live_notifier_transitions Presence transitions observed, by direction"
    )
    .unwrap();
    writeln!(
        out,
        "live_notifier_transitions_total{{status=\"online\"}} {}",
        state.board.went_live_total()
    )
    .unwrap();
    writeln!(
        out,
        "live_notifier_transitions_total{{status=\"offline\"}} {}",
        state.board.went_offline_total()
    )
    .unwrap();

    writeln!(out, "# TYPE live_notifier_delivery_failures counter").unwrap();
    writeln!(
        out,
        "# HELP live_notifier_delivery_failures Notification sends that failed"
    )
    .unwrap();
    writeln!(
        out,
        "live_notifier_delivery_failures_total {}",
        state.board.delivery_failures_total()
    )
    .unwrap();

    writeln!(out, "# TYPE live_notifier_channel_live gauge").unwrap();
    writeln!(
        out,
        "# HELP live_notifier_channel_live Whether a configured channel is currently live"
    )
    .unwrap();
    for status in &platforms {
        for channel in &status.channels {
            writeln!(
                out,
                "live_notifier_channel_live{{platform=\"{}\",channel=\"{}\"}} {}",
                status.platform.slug(),
                channel.channel,
                if channel.is_live { 1 } else { 0 }
            )
            .unwrap();
        }
    }

    writeln!(out, "# TYPE live_notifier_consecutive_failures gauge").unwrap();
    writeln!(
        out,
        "# HELP live_notifier_consecutive_failures Failed rounds in a row per platform"
    )
    .unwrap();
    for status in &platforms {
        writeln!(
            out,
            "live_notifier_consecutive_failures{{platform=\"{}\"}} {}",
            status.platform.slug(), status.consecutive_failures
        )
        .unwrap();
    }

    writeln!(
        out,
        "# TYPE live_notifier_last_round_timestamp_seconds gauge"
    )
    .unwrap();
    writeln!(
        out,
        "# HELP live_notifier_last_round_timestamp_seconds Unix timestamp of the last round per platform"
    )
    .unwrap();
    for status in &platforms {
        if let Some(t) = status.last_round {
            let secs = t.timestamp() as f64 + (t.timestamp_subsec_millis() as f64 / 1000.0);
            writeln!(
                out,
                "live_notifier_last_round_timestamp_seconds{{platform=\"{}\"}} {:.3}",
                status.platform.slug(), secs
            )
            .unwrap();
        }
    }

    writeln!(out, "# TYPE live_notifier_uptime_seconds gauge").unwrap();
    writeln!(out, "# HELP live_notifier_uptime_seconds Time since the process started").unwrap();
    let uptime = (chrono::Utc::now() - state.started_at).num_milliseconds() as f64 / 1000.0;
    writeln!(out, "live_notifier_uptime_seconds {:.3}", uptime).unwrap();

    writeln!(out, "# EOF").unwrap();

    (
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        out,
    )
}
