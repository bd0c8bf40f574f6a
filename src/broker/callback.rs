//! Subscriber capabilities
//!
//! A subscription carries two callbacks: one invoked for every message
//! delivered to the client on that channel, and one invoked when another
//! client joins or leaves a channel the subscriber is on. Both are plain
//! traits so a subscriber can be a closure, a queue sender, or anything else
//! that can be shared across threads.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::broker::message::ChannelSpec;

/// Membership change reported to peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionEvent {
    ClientSubscribed,
    ClientUnsubscribed,
}

impl ConnectionEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientSubscribed => "clientSubscribed",
            Self::ClientUnsubscribed => "clientUnsubscribed",
        }
    }
}

impl fmt::Display for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives messages published to a subscribed channel.
///
/// The returned value is collected into the publisher's `PublishOutcome`.
pub trait MessageCallback: Send + Sync {
    fn on_message(
        &self,
        source_client_id: &str,
        channel_id: &str,
        message_name: &str,
        data: &Value,
    ) -> Value;
}

impl<F> MessageCallback for F
where
    F: Fn(&str, &str, &str, &Value) -> Value + Send + Sync,
{
    fn on_message(
        &self,
        source_client_id: &str,
        channel_id: &str,
        message_name: &str,
        data: &Value,
    ) -> Value {
        self(source_client_id, channel_id, message_name, data)
    }
}

/// Receives membership changes of channels the subscriber is on.
pub trait ConnectionCallback: Send + Sync {
    fn on_client_connection(&self, event: ConnectionEvent, client_id: &str, channels: &[ChannelSpec]);
}

impl<F> ConnectionCallback for F
where
    F: Fn(ConnectionEvent, &str, &[ChannelSpec]) + Send + Sync,
{
    fn on_client_connection(&self, event: ConnectionEvent, client_id: &str, channels: &[ChannelSpec]) {
        self(event, client_id, channels)
    }
}

pub type SharedMessageCallback = Arc<dyn MessageCallback>;
pub type SharedConnectionCallback = Arc<dyn ConnectionCallback>;
