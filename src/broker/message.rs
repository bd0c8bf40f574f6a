//! Message definitions for the broker
//!
//! `MessageEnvelope` is built per publish call and never stored. Fields:
//! - `channel_id`: channel the message is routed on
//! - `source_client_id`: publishing client; never receives its own broadcast
//! - `message_id`: opaque id; the broker generates a UUID when it is empty
//! - `message_name`: application-level message kind
//! - `targets`: explicit client ids, or a broadcast to the whole channel
//! - `data`: opaque JSON payload handed to each target unchanged

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type ClientId = String;

/// Target list entry that stands for "every subscriber except the source".
pub const WILDCARD: &str = "*";

/// A channel reference as passed to subscribe/unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub channel_id: String,
    pub version: String,
}

impl ChannelSpec {
    pub fn new(channel_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            version: version.into(),
        }
    }
}

/// Who a published message goes to.
///
/// On the wire this is a plain list of ids; any list containing `"*"` is a
/// broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum TargetClients {
    Literal(Vec<ClientId>),
    Broadcast,
}

impl TargetClients {
    pub fn literal<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Literal(ids.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<String>> for TargetClients {
    fn from(ids: Vec<String>) -> Self {
        if ids.iter().any(|id| id == WILDCARD) {
            Self::Broadcast
        } else {
            Self::Literal(ids)
        }
    }
}

impl From<TargetClients> for Vec<String> {
    fn from(targets: TargetClients) -> Self {
        match targets {
            TargetClients::Literal(ids) => ids,
            TargetClients::Broadcast => vec![WILDCARD.to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub channel_id: String,
    pub source_client_id: ClientId,
    pub message_id: String,
    pub message_name: String,
    pub targets: TargetClients,
    pub data: Value,
}

/// Result returned by one target's message callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub target_client_id: ClientId,
    pub result: Value,
}

/// Resolved value of a publish: one entry per target, in delivery order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PublishOutcome {
    pub message_id: String,
    pub deliveries: Vec<Delivery>,
}

impl PublishOutcome {
    /// Callback result for the given target, if it was delivered to.
    pub fn get(&self, target_client_id: &str) -> Option<&Value> {
        self.deliveries
            .iter()
            .find(|d| d.target_client_id == target_client_id)
            .map(|d| &d.result)
    }

    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    pub fn target_ids(&self) -> Vec<&str> {
        self.deliveries
            .iter()
            .map(|d| d.target_client_id.as_str())
            .collect()
    }
}
