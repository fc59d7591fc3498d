//! Twitch Helix implementation of the status provider.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{StatusProvider, StatusSnapshot, StreamId};
use crate::{Error, Result};

/// Helix caps bulk lookups at 100 ids per request.
const MAX_IDS_PER_REQUEST: usize = 100;

/// Default Helix API base URL.
const DEFAULT_API_BASE: &str = "https://api.twitch.tv/helix";

/// Twitch provider configuration.
#[derive(Debug, Clone)]
pub struct TwitchConfig {
    pub client_id: String,
    pub access_token: String,
    pub api_base: String,
    /// Upper bound for a single provider round-trip; the polling loop is
    /// never blocked longer than this per request.
    pub request_timeout: Duration,
}

impl Default for TwitchConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            access_token: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Twitch Helix status provider.
pub struct TwitchProvider {
    config: TwitchConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct StreamsResponse {
    data: Vec<HelixStream>,
}

#[derive(Debug, Deserialize)]
struct HelixStream {
    user_id: String,
    user_login: String,
    title: Option<String>,
    game_name: Option<String>,
    viewer_count: Option<u64>,
    started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    data: Vec<HelixUser>,
}

#[derive(Debug, Deserialize)]
struct HelixUser {
    id: String,
    login: String,
}

impl TwitchProvider {
    pub fn new(config: TwitchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.config.api_base, path);
        let response = self
            .client
            .get(&url)
            .header("Client-Id", &self.config.client_id)
            .bearer_auth(&self.config.access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::ProviderUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ProviderUnavailable(format!(
                "{} returned HTTP {}",
                path, status
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::ProviderUnavailable(format!("invalid {} payload: {}", path, e)))
    }
}

#[async_trait]
impl StatusProvider for TwitchProvider {
    async fn get_status(&self, ids: &[StreamId]) -> Result<HashMap<StreamId, StatusSnapshot>> {
        let mut live = HashMap::new();

        for chunk in ids.chunks(MAX_IDS_PER_REQUEST) {
            let query: Vec<(&str, String)> =
                chunk.iter().map(|id| ("user_id", id.to_string())).collect();
            let response: StreamsResponse = self.get_json("streams", &query).await?;

            for stream in response.data {
                let Ok(stream_id) = stream.user_id.parse::<StreamId>() else {
                    warn!(user_id = %stream.user_id, "skipping stream with non-numeric id");
                    continue;
                };
                live.insert(
                    stream_id,
                    StatusSnapshot {
                        stream_id,
                        name: stream.user_login,
                        title: stream.title,
                        category: stream.game_name,
                        viewer_count: stream.viewer_count,
                        started_at: stream.started_at,
                    },
                );
            }
        }

        debug!(queried = ids.len(), live = live.len(), "status lookup done");
        Ok(live)
    }

    async fn get_ids(&self, names: &[String]) -> Result<HashMap<String, StreamId>> {
        let mut resolved = HashMap::new();

        for chunk in names.chunks(MAX_IDS_PER_REQUEST) {
            let query: Vec<(&str, String)> =
                chunk.iter().map(|name| ("login", name.clone())).collect();
            let response: UsersResponse = self.get_json("users", &query).await?;

            for user in response.data {
                match user.id.parse::<StreamId>() {
                    Ok(id) => {
                        resolved.insert(user.login, id);
                    }
                    Err(_) => warn!(login = %user.login, id = %user.id, "unparsable user id"),
                }
            }
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TwitchConfig::default();
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_streams_payload_parses() {
        let payload = r#"{
            "data": [{
                "user_id": "123",
                "user_login": "some_streamer",
                "title": "playing something",
                "game_name": "Something",
                "viewer_count": 42,
                "started_at": "2024-01-01T00:00:00Z"
            }]
        }"#;
        let parsed: StreamsResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.data.len(), 1);
        assert_eq!(parsed.data[0].user_id, "123");
        assert_eq!(parsed.data[0].viewer_count, Some(42));
    }
}
