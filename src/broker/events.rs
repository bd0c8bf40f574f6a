//! Internal event bus
//!
//! Membership changes (subscribe, unsubscribe, disconnect) are announced on
//! a `tokio::sync::broadcast` channel so in-process observers can follow the
//! registry without holding a subscription of their own. Publishes are
//! point-to-point deliveries and never appear here.
//!
//! Emitting with no live receivers is not an error; slow receivers lag and
//! lose the oldest events, as `broadcast` does.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::broker::message::{ChannelSpec, ClientId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum BrokerEvent {
    #[serde(rename_all = "camelCase")]
    ClientSubscribed {
        client_id: ClientId,
        channels: Vec<ChannelSpec>,
        at: i64,
    },
    #[serde(rename_all = "camelCase")]
    ClientUnsubscribed {
        client_id: ClientId,
        channels: Vec<ChannelSpec>,
        at: i64,
    },
    #[serde(rename_all = "camelCase")]
    ClientDisconnected {
        client_id: ClientId,
        channels: Vec<ChannelSpec>,
        at: i64,
    },
}

impl BrokerEvent {
    pub fn subscribed(client_id: &str, channels: Vec<ChannelSpec>) -> Self {
        Self::ClientSubscribed {
            client_id: client_id.to_string(),
            channels,
            at: now_millis(),
        }
    }

    pub fn unsubscribed(client_id: &str, channels: Vec<ChannelSpec>) -> Self {
        Self::ClientUnsubscribed {
            client_id: client_id.to_string(),
            channels,
            at: now_millis(),
        }
    }

    pub fn disconnected(client_id: &str, channels: Vec<ChannelSpec>) -> Self {
        Self::ClientDisconnected {
            client_id: client_id.to_string(),
            channels,
            at: now_millis(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ClientSubscribed { .. } => "clientSubscribed",
            Self::ClientUnsubscribed { .. } => "clientUnsubscribed",
            Self::ClientDisconnected { .. } => "clientDisconnected",
        }
    }

    pub fn client_id(&self) -> &str {
        match self {
            Self::ClientSubscribed { client_id, .. }
            | Self::ClientUnsubscribed { client_id, .. }
            | Self::ClientDisconnected { client_id, .. } => client_id,
        }
    }

    pub fn channels(&self) -> &[ChannelSpec] {
        match self {
            Self::ClientSubscribed { channels, .. }
            | Self::ClientUnsubscribed { channels, .. }
            | Self::ClientDisconnected { channels, .. } => channels,
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<BrokerEvent>,
}

impl EventBus {
    /// Default number of buffered events per receiver.
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn emit(&self, event: BrokerEvent) {
        let name = event.name();
        match self.tx.send(event) {
            Ok(receivers) => trace!("{name} delivered to {receivers} observer(s)"),
            Err(_) => trace!("{name} emitted with no observers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BrokerEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
