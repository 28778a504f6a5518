use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use curator_core::config::MonitorConfig;

/// One entry of the remote channel directory.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Channel {
    #[serde(rename = "channel_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "unique_id_token")]
    pub token: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MonitorError {
    #[error("monitor request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for MonitorError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error.to_string())
    }
}

/// Fetches the channel directory. Callers treat failures as "zero results"
/// so the dialogue never hangs on a broken remote.
#[async_trait]
pub trait ChannelLookup: Send + Sync {
    async fn list_channels(&self) -> Result<Vec<Channel>, MonitorError>;
}

/// Files an item into a channel. Best-effort by contract: the response body
/// is informational only and failures never reach the user.
#[async_trait]
pub trait ItemSink: Send + Sync {
    async fn add_item(&self, correlation_token: &str, item: &str) -> Result<(), MonitorError>;
}

#[derive(Default)]
pub struct NoopChannelLookup;

#[async_trait]
impl ChannelLookup for NoopChannelLookup {
    async fn list_channels(&self) -> Result<Vec<Channel>, MonitorError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub struct NoopItemSink;

#[async_trait]
impl ItemSink for NoopItemSink {
    async fn add_item(&self, _correlation_token: &str, _item: &str) -> Result<(), MonitorError> {
        Ok(())
    }
}

pub struct HttpMonitorClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
}

impl HttpMonitorClient {
    pub fn new(config: &MonitorConfig) -> Result<Self, MonitorError> {
        let http = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
        })
    }

    fn channels_endpoint(&self) -> String {
        format!("{}/channels.php", self.base_url)
    }
}

#[async_trait]
impl ChannelLookup for HttpMonitorClient {
    async fn list_channels(&self) -> Result<Vec<Channel>, MonitorError> {
        let payload: Value = self
            .http
            .get(self.channels_endpoint())
            .query(&[("action", "list"), ("api_key", self.api_key.expose_secret())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(parse_channel_list(&payload))
    }
}

#[async_trait]
impl ItemSink for HttpMonitorClient {
    async fn add_item(&self, correlation_token: &str, item: &str) -> Result<(), MonitorError> {
        let response = self
            .http
            .get(self.channels_endpoint())
            .query(&[
                ("action", "add_item"),
                ("api_key", self.api_key.expose_secret()),
                ("uniqueid", correlation_token),
                ("item", item),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        debug!(
            event_name = "monitor.add_item.response",
            status = %status,
            body = %body,
            "monitor add_item responded"
        );

        Ok(())
    }
}

/// A missing or malformed `channels` key means zero results, and entries
/// that fail to decode are skipped rather than failing the whole lookup.
fn parse_channel_list(payload: &Value) -> Vec<Channel> {
    payload
        .get("channels")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| serde_json::from_value::<Channel>(entry.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_channel_list;

    #[test]
    fn parses_well_formed_channel_list() {
        let payload = json!({
            "channels": [
                { "channel_id": "1", "name": "Alpha", "unique_id_token": "tok-1" },
                { "channel_id": "2", "name": "Beta", "unique_id_token": "tok-2" },
            ]
        });

        let channels = parse_channel_list(&payload);

        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].id, "1");
        assert_eq!(channels[0].name, "Alpha");
        assert_eq!(channels[1].token, "tok-2");
    }

    #[test]
    fn absent_channels_key_yields_zero_results() {
        assert!(parse_channel_list(&json!({ "status": "ok" })).is_empty());
    }

    #[test]
    fn malformed_channels_key_yields_zero_results() {
        assert!(parse_channel_list(&json!({ "channels": 42 })).is_empty());
        assert!(parse_channel_list(&json!({ "channels": "nope" })).is_empty());
    }

    #[test]
    fn undecodable_entries_are_skipped() {
        let payload = json!({
            "channels": [
                { "channel_id": "1", "name": "Alpha", "unique_id_token": "tok-1" },
                { "name": "missing id and token" },
            ]
        });

        let channels = parse_channel_list(&payload);

        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].id, "1");
    }
}
