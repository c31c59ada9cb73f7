//! Broadcast-channel realtime transport.
//!
//! Connected sessions subscribe to the hub and filter messages for their
//! user. Delivery is fire-and-forget: with nobody listening the message is
//! dropped.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::domain::UserId;
use crate::domain::ports::{RealtimeTransport, RealtimeTransportError};

/// Default number of messages buffered per subscriber.
pub const DEFAULT_REALTIME_CAPACITY: usize = 256;

/// One message addressed to a user.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeMessage {
    pub user_id: UserId,
    pub payload: Value,
}

/// In-process fan-out hub for realtime messages.
#[derive(Debug, Clone)]
pub struct BroadcastRealtimeHub {
    sender: broadcast::Sender<RealtimeMessage>,
}

impl BroadcastRealtimeHub {
    /// Create a hub buffering `capacity` messages per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Listen for every subsequent message.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeMessage> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastRealtimeHub {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_REALTIME_CAPACITY)
    }
}

#[async_trait]
impl RealtimeTransport for BroadcastRealtimeHub {
    async fn deliver(
        &self,
        user_id: &UserId,
        payload: &Value,
    ) -> Result<(), RealtimeTransportError> {
        let message = RealtimeMessage {
            user_id: *user_id,
            payload: payload.clone(),
        };
        match self.sender.send(message) {
            Ok(receivers) => trace!(user_id = %user_id, receivers, "realtime message sent"),
            Err(_) => debug!(user_id = %user_id, "no realtime listeners; message dropped"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn subscribers_receive_messages() {
        let hub = BroadcastRealtimeHub::with_capacity(4);
        let mut receiver = hub.subscribe();
        let user_id = UserId::random();

        hub.deliver(&user_id, &json!({ "type": "level_up" }))
            .await
            .expect("delivered");

        let message = receiver.recv().await.expect("message");
        assert_eq!(message.user_id, user_id);
        assert_eq!(message.payload["type"], "level_up");
    }

    #[tokio::test]
    async fn delivery_without_listeners_succeeds() {
        let hub = BroadcastRealtimeHub::default();
        hub.deliver(&UserId::random(), &json!({}))
            .await
            .expect("dropped silently");
    }
}
