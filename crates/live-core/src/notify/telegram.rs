use async_trait::async_trait;
use reqwest::Client;

use crate::error::NotifyError;

use super::{Destination, NotificationMeta};

pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// One Telegram chat reached through the Bot API `sendMessage` call.
pub struct TelegramDestination {
    client: Client,
    token: String,
    chat_id: String,
    disable_web_page_preview: bool,
    base_url: String,
}

impl TelegramDestination {
    pub fn new(client: Client, token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            client,
            token: token.into(),
            chat_id: chat_id.into(),
            disable_web_page_preview: false,
            base_url: TELEGRAM_API_URL.to_string(),
        }
    }

    pub fn with_web_page_preview_disabled(mut self, disabled: bool) -> Self {
        self.disable_web_page_preview = disabled;
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl Destination for TelegramDestination {
    fn label(&self) -> String {
        format!("telegram:{}", self.chat_id)
    }

    async fn send(&self, message: &str, _meta: &NotificationMeta) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": message,
            "parse_mode": "Markdown",
            "disable_web_page_preview": self.disable_web_page_preview,
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Network {
                destination: self.label(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(NotifyError::Http {
                destination: self.label(),
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use crate::presence::TransitionKind;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn meta() -> NotificationMeta {
        NotificationMeta {
            platform: Platform::Twitch,
            kind: TransitionKind::WentLive,
            channel: "foo".into(),
            viewer_count: None,
            url: "https://www.twitch.tv/foo".into(),
        }
    }

    #[test]
    fn label_names_chat_not_token() {
        let d = TelegramDestination::new(Client::new(), "secret-token", "42");
        assert_eq!(d.label(), "telegram:42");
        assert!(!d.label().contains("secret-token"));
    }

    #[tokio::test]
    async fn send_posts_markdown_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": "42",
                "text": "hello",
                "parse_mode": "Markdown",
                "disable_web_page_preview": true,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let d = TelegramDestination::new(Client::new(), "TOKEN", "42")
            .with_web_page_preview_disabled(true)
            .with_base_url(server.uri());
        d.send("hello", &meta()).await.unwrap();
    }

    #[tokio::test]
    async fn api_error_maps_to_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let d = TelegramDestination::new(Client::new(), "TOKEN", "42").with_base_url(server.uri());
        let err = d.send("hello", &meta()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Http { status: 403, .. }));
    }
}
