//! Port for best-effort real-time delivery to connected clients.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::UserId;

use super::define_port_error;

define_port_error! {
    /// Errors raised by real-time transports.
    pub enum RealtimeTransportError {
        /// The transport cannot accept messages at the moment.
        Unavailable { message: String } =>
            "realtime transport unavailable: {message}"; transient,
    }
}

/// Push a payload to whatever sessions a user has open.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Deliver `payload` to `user_id`. Having no listener is not an error.
    async fn deliver(&self, user_id: &UserId, payload: &Value)
    -> Result<(), RealtimeTransportError>;
}
