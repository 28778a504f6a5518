use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::messages::IncomingMessage;
use crate::router::MessageRouter;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// The chat connection seam. The real-time messaging protocol lives behind
/// this trait; `None` from `next_message` means the stream closed cleanly.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_message(&self) -> Result<Option<IncomingMessage>, TransportError>;
    async fn send(&self, conversation_id: &str, text: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopChatTransport;

#[async_trait]
impl ChatTransport for NoopChatTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_message(&self) -> Result<Option<IncomingMessage>, TransportError> {
        Ok(None)
    }

    async fn send(&self, _conversation_id: &str, _text: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Pumps messages from the transport through the router and sends the
/// replies back, reconnecting with backoff on transport failures.
pub struct BotRunner {
    transport: Arc<dyn ChatTransport>,
    router: Arc<MessageRouter>,
    reconnect_policy: ReconnectPolicy,
}

impl BotRunner {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        router: Arc<MessageRouter>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, router, reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "chat transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "chat transport retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening chat transport connection");
        self.transport.connect().await?;
        info!(attempt, "chat transport connected");

        loop {
            if self.router.shutdown_requested() {
                info!(
                    event_name = "ingress.shutdown_honored",
                    "shutdown confirmed; closing chat transport"
                );
                self.transport.disconnect().await?;
                return Ok(());
            }

            let Some(message) = self.transport.next_message().await? else {
                info!(attempt, "chat transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };

            debug!(
                event_name = "ingress.message_received",
                conversation_id = %message.conversation_id,
                user_id = %message.user_id,
                "received chat message"
            );

            let replies = self.router.handle_message(&message).await;
            for reply in replies {
                if let Err(error) = self.transport.send(&message.conversation_id, &reply).await {
                    warn!(
                        event_name = "egress.send_failed",
                        conversation_id = %message.conversation_id,
                        error = %error,
                        "reply send failed; continuing pump loop"
                    );
                }
            }
        }
    }
}
