use async_trait::async_trait;
use reqwest::Client;

use crate::error::NotifyError;

use super::{Destination, NotificationMeta};

/// One Discord webhook endpoint.
pub struct DiscordDestination {
    client: Client,
    webhook_url: String,
}

impl DiscordDestination {
    pub fn new(client: Client, webhook_url: impl Into<String>) -> Self {
        Self {
            client,
            webhook_url: webhook_url.into(),
        }
    }
}

#[async_trait]
impl Destination for DiscordDestination {
    fn label(&self) -> String {
        // Webhook URLs embed a token; keep only the path prefix in logs.
        let trimmed = self
            .webhook_url
            .split("/api/webhooks/")
            .nth(1)
            .and_then(|rest| rest.split('/').next())
            .unwrap_or("webhook");
        format!("discord:{trimmed}")
    }

    async fn send(&self, message: &str, _meta: &NotificationMeta) -> Result<(), NotifyError> {
        let body = serde_json::json!({ "content": message });

        let resp = self
            .client
            .post(&self.webhook_url)
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
