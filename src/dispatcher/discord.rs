//! Discord REST implementation of the notification dispatcher.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{NotificationContent, NotificationDispatcher, NotificationHandle};
use crate::database::models::DestinationRecord;
use crate::{Error, Result};

/// Default Discord REST API base URL.
const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Discord dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub bot_token: String,
    pub api_base: String,
    pub request_timeout: Duration,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Discord notification dispatcher.
pub struct DiscordDispatcher {
    config: DiscordConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    id: String,
}

impl DiscordDispatcher {
    pub fn new(config: DiscordConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn render(content: &NotificationContent) -> String {
        if content.mention_everyone {
            format!("@everyone {}", content.text)
        } else {
            content.text.clone()
        }
    }
}

#[async_trait]
impl NotificationDispatcher for DiscordDispatcher {
    async fn post(
        &self,
        destination: &DestinationRecord,
        content: &NotificationContent,
    ) -> Result<NotificationHandle> {
        let url = format!(
            "{}/channels/{}/messages",
            self.config.api_base, destination.id
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bot {}", self.config.bot_token))
            .json(&json!({ "content": Self::render(content) }))
            .send()
            .await
            .map_err(|e| Error::Dispatch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Dispatch(format!(
                "post to destination {} returned HTTP {}",
                destination.id, status
            )));
        }

        let message: MessageResponse = response
            .json()
            .await
            .map_err(|e| Error::Dispatch(format!("invalid message payload: {}", e)))?;

        debug!(
            destination_id = destination.id,
            message_id = %message.id,
            "notification posted"
        );

        Ok(NotificationHandle {
            destination_id: destination.id,
            message_id: message.id,
            created_at: Utc::now(),
        })
    }

    async fn edit(
        &self,
        handle: &NotificationHandle,
        content: &NotificationContent,
    ) -> Result<()> {
        let url = format!(
            "{}/channels/{}/messages/{}",
            self.config.api_base, handle.destination_id, handle.message_id
        );

        let response = self
            .client
            .patch(&url)
            .header("Authorization", format!("Bot {}", self.config.bot_token))
            .json(&json!({ "content": Self::render(content) }))
            .send()
            .await
            .map_err(|e| Error::Dispatch(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(Error::NotificationGone {
                destination_id: handle.destination_id,
                message_id: handle.message_id.clone(),
            }),
            status => Err(Error::Dispatch(format!(
                "edit of message {} returned HTTP {}",
                handle.message_id, status
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_everyone_prefix() {
        let content = NotificationContent {
            text: "alice is live".to_string(),
            mention_everyone: true,
        };
        assert_eq!(DiscordDispatcher::render(&content), "@everyone alice is live");

        let quiet = NotificationContent {
            text: "alice is live".to_string(),
            mention_everyone: false,
        };
        assert_eq!(DiscordDispatcher::render(&quiet), "alice is live");
    }
}
