mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::{fmt, EnvFilter};

use live_core::{
    build_http_client, CredentialCache, Destination, DiscordDestination, Dispatcher, KickPoller,
    NotificationMeta, Notifier, NotifyError, OauthApp, PlatformUnit, TelegramDestination,
    TransitionKind, TwitchPoller,
};

use crate::config::AppConfig;

fn version_string() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");

    if GIT_HASH.is_empty() {
        // Leak is fine — called once, lives for the program's lifetime.
        Box::leak(VERSION.to_string().into_boxed_str())
    } else {
        Box::leak(format!("{VERSION} ({GIT_HASH})").into_boxed_str())
    }
}

/// Live-stream presence notifier — polls Twitch and Kick, announces edges.
#[derive(Parser)]
#[command(name = "live-notifier", version = version_string(), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the notifier loop and the status HTTP server.
    Run {
        /// Path to TOML config file.
        #[arg(short, long)]
        config: PathBuf,

        /// Listen address (e.g. 0.0.0.0:8080). Overrides config file.
        #[arg(short, long)]
        listen: Option<SocketAddr>,
    },
    /// Run a single polling round and print the results to the terminal.
    Check {
        /// Path to TOML config file.
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, listen } => {
            run(config, listen).await;
        }
        Commands::Check { config } => {
            fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
                )
                .init();
            check(config).await;
        }
    }
}

fn load_config(path: &PathBuf) -> AppConfig {
    match AppConfig::load(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

/// Wire the core components out of a validated config. `destinations`
/// replaces the configured sinks when given (one-shot check mode).
fn build_notifier(
    app_config: &AppConfig,
    destinations: Option<Vec<Box<dyn Destination>>>,
) -> Notifier {
    let poller_config = app_config.poller.to_poller_config();
    let client = build_http_client(poller_config.request_timeout);

    let mut apps = Vec::new();
    let mut units = Vec::new();

    if let Some(twitch) = app_config.twitch.as_ref().filter(|s| s.enabled) {
        apps.push(OauthApp::twitch(&twitch.client_id, &twitch.client_secret));
        units.push(PlatformUnit {
            poller: Arc::new(TwitchPoller::new(client.clone(), &twitch.client_id)),
            streamers: twitch.streamers.clone(),
        });
    }
    if let Some(kick) = app_config.kick.as_ref().filter(|s| s.enabled) {
        apps.push(OauthApp::kick(&kick.client_id, &kick.client_secret));
        units.push(PlatformUnit {
            poller: Arc::new(KickPoller::new(
                client.clone(),
                poller_config.max_concurrent_fetches,
            )),
            streamers: kick.streamers.clone(),
        });
    }

    let destinations = destinations.unwrap_or_else(|| {
        let mut out: Vec<Box<dyn Destination>> = Vec::new();
        for telegram in &app_config.telegram {
            out.push(Box::new(
                TelegramDestination::new(client.clone(), &telegram.token, &telegram.chat_id)
                    .with_web_page_preview_disabled(telegram.disable_web_page_preview),
            ));
        }
        for discord in &app_config.discord {
            out.push(Box::new(DiscordDestination::new(
                client.clone(),
                &discord.url,
            )));
        }
        out
    });

    let credentials = CredentialCache::new(client, &poller_config, apps);
    let mut notifier = Notifier::new(
        poller_config,
        credentials,
        units,
        Dispatcher::new(destinations),
    );
    if let Some(ref template) = app_config.template.message {
        notifier = notifier.with_template(template.clone());
    }
    notifier
}

async fn run(config_path: PathBuf, listen_override: Option<SocketAddr>) {
    let app_config = load_config(&config_path);
    init_tracing(&app_config.server.log_format);
    tracing::info!(path = %config_path.display(), "Loaded config file");

    let notifier = build_notifier(&app_config, None);
    let board = notifier.board();
    notifier.start().await;

    if app_config.server.enabled {
        let listen = listen_override.unwrap_or(app_config.server.listen);
        let state = live_api::state::AppState::new().with_board(board);

        tracing::info!(%listen, "Starting status API server");
        if let Err(e) =
            live_api::serve_with_state(listen, state, live_api::shutdown_signal()).await
        {
            tracing::error!(error = %e, "Server failed");
            std::process::exit(1);
        }
    } else {
        live_api::shutdown_signal().await;
    }

    tracing::info!("Shutdown signal received, stopping notifier...");
    notifier.stop().await;
    tracing::info!("Shutdown complete");
}

/// Prints every would-be notification to the terminal instead of sending it.
struct ConsoleDestination;

#[async_trait]
impl Destination for ConsoleDestination {
    fn label(&self) -> String {
        "console".into()
    }

    async fn send(&self, message: &str, meta: &NotificationMeta) -> Result<(), NotifyError> {
        let badge = match meta.kind {
            TransitionKind::WentLive => style("LIVE   ").green().bold(),
            TransitionKind::WentOffline => style("OFFLINE").red().bold(),
        };
        println!(
            "  {}  {} {}",
            badge,
            style(format!("{}/{}", meta.platform, meta.channel)).bold(),
            style(&meta.url).dim()
        );
        for line in message.lines() {
            println!("           {}", style(line).dim());
        }
        Ok(())
    }
}

async fn check(config_path: PathBuf) {
    let app_config = load_config(&config_path);

    println!(
        "{} {}",
        style("live-notifier").bold(),
        style(env!("CARGO_PKG_VERSION")).dim()
    );
    println!("  {} {}\n", style("config:").dim(), config_path.display());

    let notifier = build_notifier(&app_config, Some(vec![Box::new(ConsoleDestination)]));
    notifier.poll_once().await;

    println!();
    let board = notifier.board();
    let statuses = board.platforms();
    if statuses.is_empty() {
        println!("{}", style("No platform round completed.").red());
        std::process::exit(1);
    }
    for status in &statuses {
        if status.consecutive_failures > 0 {
            println!(
                "{} {}",
                style(status.platform.display_name()).bold(),
                style("round failed").red()
            );
            continue;
        }
        println!("{}", style(status.platform.display_name()).bold());
        for channel in &status.channels {
            let flag = if channel.is_live {
                style("live").green()
            } else {
                style("offline").dim()
            };
            println!("  {:<24} {}", channel.channel, flag);
        }
    }
}

fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_format {
        "json" => {
            fmt().with_env_filter(filter).json().init();
        }
        _ => {
            fmt().with_env_filter(filter).init();
        }
    }
}
