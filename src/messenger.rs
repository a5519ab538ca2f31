//! Outbound replies to the messaging channel

use crate::error::EngineError;
use crate::identity::log_tag;
use crate::Result;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info};

#[async_trait::async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, to: &str, text: &str) -> Result<()>;
}

/// Writes replies to the log. Used when no transport is configured.
pub struct LogMessenger;

#[async_trait::async_trait]
impl Messenger for LogMessenger {
    async fn send(&self, to: &str, text: &str) -> Result<()> {
        info!(user = %log_tag(to), chars = text.len(), "Outbound message");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    to: &'a str,
    message: &'a str,
}

/// POSTs `{to, message}` to a gateway that relays to the channel.
pub struct WebhookMessenger {
    client: Client,
    url: String,
}

impl WebhookMessenger {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait::async_trait]
impl Messenger for WebhookMessenger {
    async fn send(&self, to: &str, text: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&OutboundMessage { to, message: text })
            .send()
            .await
            .map_err(|e| {
                error!("Outbound webhook request failed: {}", e);
                EngineError::MessagingError(format!("Outbound webhook error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, "Outbound webhook rejected message: {}", body);
            return Err(EngineError::MessagingError(format!(
                "Outbound webhook returned {}",
                status
            )));
        }

        Ok(())
    }
}

/// Keeps every message in memory.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Arc<RwLock<Vec<(String, String)>>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.read().await.clone()
    }

    /// Last message sent to `to`.
    pub async fn last_to(&self, to: &str) -> Option<String> {
        self.sent
            .read()
            .await
            .iter()
            .rev()
            .find(|(recipient, _)| recipient == to)
            .map(|(_, text)| text.clone())
    }

    pub async fn clear(&self) {
        self.sent.write().await.clear();
    }
}

#[async_trait::async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, to: &str, text: &str) -> Result<()> {
        self.sent.write().await.push((to.to_string(), text.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_messenger_keeps_order() {
        let messenger = RecordingMessenger::new();
        messenger.send("a", "um").await.unwrap();
        messenger.send("b", "dois").await.unwrap();
        messenger.send("a", "três").await.unwrap();

        assert_eq!(messenger.sent().await.len(), 3);
        assert_eq!(messenger.last_to("a").await.as_deref(), Some("três"));
        assert_eq!(messenger.last_to("c").await, None);

        messenger.clear().await;
        assert!(messenger.sent().await.is_empty());
    }

    #[test]
    fn test_outbound_payload_shape() {
        let json = serde_json::to_value(OutboundMessage {
            to: "5511@c.us",
            message: "oi",
        })
        .unwrap();
        assert_eq!(json["to"], "5511@c.us");
        assert_eq!(json["message"], "oi");
    }
}
