//! TOML configuration file schema and parsing.
//!
//! Example config file:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8080"
//! log_format = "json"
//!
//! [poller]
//! interval_ms = 60000
//!
//! [twitch]
//! client_id = "abc"
//! client_secret = "..."
//! streamers = ["foo", "bar"]
//!
//! [kick]
//! client_id = "def"
//! client_secret = "..."
//! streamers = ["baz"]
//!
//! [[telegram]]
//! token = "123:abc"
//! chat_id = "-1001234"
//!
//! [[discord]]
//! url = "https://discord.com/api/webhooks/1/t"
//! ```
//!
//! Secrets may be left out of the file and provided via the environment:
//! `TWITCH_CLIENT_ID`, `TWITCH_CLIENT_SECRET`, `KICK_CLIENT_ID`,
//! `KICK_CLIENT_SECRET` and `TELEGRAM_TOKEN` override the file values.

use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

use live_core::PollerConfig;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub poller: PollerSection,

    #[serde(default)]
    pub template: TemplateSection,

    #[serde(default)]
    pub twitch: Option<PlatformSection>,

    #[serde(default)]
    pub kick: Option<PlatformSection>,

    #[serde(default)]
    pub telegram: Vec<TelegramSection>,

    #[serde(default)]
    pub discord: Vec<DiscordSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            listen: default_listen(),
            log_format: default_log_format(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_listen() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_log_format() -> String {
    "pretty".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollerSection {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_token_retries")]
    pub token_retries: u32,

    #[serde(default = "default_token_retry_backoff_ms")]
    pub token_retry_backoff_ms: u64,

    #[serde(default)]
    pub max_concurrent_fetches: Option<usize>,
}

impl Default for PollerSection {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            token_retries: default_token_retries(),
            token_retry_backoff_ms: default_token_retry_backoff_ms(),
            max_concurrent_fetches: None,
        }
    }
}

fn default_interval_ms() -> u64 {
    60_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_token_retries() -> u32 {
    3
}

fn default_token_retry_backoff_ms() -> u64 {
    2_000
}

impl PollerSection {
    pub fn to_poller_config(&self) -> PollerConfig {
        let mut c = PollerConfig::default()
            .with_poll_interval(self.interval_ms)
            .with_request_timeout(self.request_timeout_ms)
            .with_token_retries(self.token_retries)
            .with_token_retry_backoff(self.token_retry_backoff_ms);
        if let Some(max) = self.max_concurrent_fetches {
            c = c.with_max_concurrent_fetches(max);
        }
        c
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TemplateSection {
    /// Message template for went-live notifications. Empty means the
    /// built-in default.
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformSection {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    #[serde(default)]
    pub streamers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSection {
    #[serde(default)]
    pub token: String,

    pub chat_id: String,

    #[serde(default)]
    pub disable_web_page_preview: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordSection {
    pub url: String,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let mut config: AppConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables take precedence over file values, so secrets
    /// never have to live on disk.
    pub fn apply_env_overrides(&mut self) {
        if let Some(ref mut twitch) = self.twitch {
            if let Ok(v) = std::env::var("TWITCH_CLIENT_ID") {
                twitch.client_id = v;
            }
            if let Ok(v) = std::env::var("TWITCH_CLIENT_SECRET") {
                twitch.client_secret = v;
            }
        }
        if let Some(ref mut kick) = self.kick {
            if let Ok(v) = std::env::var("KICK_CLIENT_ID") {
                kick.client_id = v;
            }
            if let Ok(v) = std::env::var("KICK_CLIENT_SECRET") {
                kick.client_secret = v;
            }
        }
        if let Ok(v) = std::env::var("TELEGRAM_TOKEN") {
            for telegram in &mut self.telegram {
                telegram.token = v.clone();
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let enabled_platforms = [("twitch", &self.twitch), ("kick", &self.kick)]
            .into_iter()
            .filter(|(_, s)| s.as_ref().is_some_and(|s| s.enabled))
            .count();
        if enabled_platforms == 0 {
            return Err("No platform enabled: configure [twitch] and/or [kick]".into());
        }

        for (name, section) in [("twitch", &self.twitch), ("kick", &self.kick)] {
            let Some(section) = section else { continue };
            if !section.enabled {
                continue;
            }
            if section.client_id.is_empty() || section.client_secret.is_empty() {
                return Err(format!(
                    "Platform '{}' is enabled but has no client credentials",
                    name
                ));
            }
            if section.streamers.is_empty() {
                return Err(format!("Platform '{}' has no streamers configured", name));
            }
            let mut seen = std::collections::HashSet::new();
            for streamer in &section.streamers {
                if streamer.is_empty() {
                    return Err(format!("Platform '{}' has an empty streamer name", name));
                }
                if !seen.insert(streamer.to_ascii_lowercase()) {
                    return Err(format!(
                        "Duplicate streamer '{}' for platform '{}'",
                        streamer, name
                    ));
                }
            }
        }

        for (i, telegram) in self.telegram.iter().enumerate() {
            if telegram.token.is_empty() {
                return Err(format!("Telegram destination at index {} has no token", i));
            }
            if telegram.chat_id.is_empty() {
                return Err(format!("Telegram destination at index {} has no chat_id", i));
            }
        }

        for (i, discord) in self.discord.iter().enumerate() {
            let parsed = url::Url::parse(&discord.url)
                .map_err(|e| format!("Invalid Discord webhook URL at index {}: {}", i, e))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(format!(
                    "Discord webhook URL must use http or https at index {}",
                    i
                ));
            }
        }

        match self.server.log_format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(format!(
                    "Invalid log_format '{}': must be 'pretty' or 'json'",
                    other
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
[twitch]
client_id = "id"
client_secret = "secret"
streamers = ["foo"]
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.poller.interval_ms, 60_000);
        assert_eq!(config.server.log_format, "pretty");
        assert!(config.server.enabled);
        assert!(config.kick.is_none());
        assert!(config.telegram.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[server]
listen = "127.0.0.1:9090"
log_format = "json"

[poller]
interval_ms = 30000
token_retries = 5

[template]
message = "{user_name} is live"

[twitch]
client_id = "tid"
client_secret = "tsecret"
streamers = ["foo", "bar"]

[kick]
enabled = false
client_id = "kid"
client_secret = "ksecret"
streamers = ["baz"]

[[telegram]]
token = "123:abc"
chat_id = "-100"
disable_web_page_preview = true

[[discord]]
url = "https://discord.com/api/webhooks/1/t"
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.server.listen.port(), 9090);
        assert_eq!(config.poller.interval_ms, 30_000);
        assert_eq!(config.poller.token_retries, 5);
        assert_eq!(config.template.message.as_deref(), Some("{user_name} is live"));
        assert!(!config.kick.as_ref().unwrap().enabled);
        assert!(config.telegram[0].disable_web_page_preview);

        let poller = config.poller.to_poller_config();
        assert_eq!(poller.poll_interval.as_millis(), 30_000);
        assert_eq!(poller.token_retries, 5);
    }

    #[test]
    fn validate_rejects_no_enabled_platform() {
        let toml = r#"
[kick]
enabled = false
client_id = "id"
client_secret = "secret"
streamers = ["baz"]
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("No platform enabled"), "{}", err);
    }

    #[test]
    fn validate_rejects_missing_credentials() {
        let toml = r#"
[twitch]
streamers = ["foo"]
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("no client credentials"), "{}", err);
    }

    #[test]
    fn validate_rejects_duplicate_streamers() {
        let toml = r#"
[twitch]
client_id = "id"
client_secret = "secret"
streamers = ["foo", "Foo"]
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("Duplicate streamer"), "{}", err);
    }

    #[test]
    fn validate_rejects_empty_streamer_list() {
        let toml = r#"
[twitch]
client_id = "id"
client_secret = "secret"
streamers = []
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("no streamers"), "{}", err);
    }

    #[test]
    fn validate_rejects_invalid_discord_url() {
        let toml = r#"
[twitch]
client_id = "id"
client_secret = "secret"
streamers = ["foo"]

[[discord]]
url = "not-a-url"
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("Invalid Discord webhook URL"), "{}", err);
    }

    #[test]
    fn validate_rejects_telegram_without_token() {
        let toml = r#"
[twitch]
client_id = "id"
client_secret = "secret"
streamers = ["foo"]

[[telegram]]
chat_id = "-100"
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("has no token"), "{}", err);
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let toml = r#"
[server]
log_format = "xml"

[twitch]
client_id = "id"
client_secret = "secret"
streamers = ["foo"]
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("Invalid log_format"), "{}", err);
    }
}
