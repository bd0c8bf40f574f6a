//! Channel membership
//!
//! A `Channel` holds the ordered list of clients subscribed to one channel
//! id. Order is subscription order and is what peers observe when the broker
//! fans out membership notifications or wildcard publishes. A client appears
//! at most once per channel.
//!
//! Concurrency note: callers must synchronize access to `Channel` (the
//! broker keeps it behind the registry lock).

use serde::{Deserialize, Serialize};

use crate::broker::message::ClientId;

/// One subscribed client and the channel version it asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub client_id: ClientId,
    pub version: String,
}

#[derive(Debug, Default)]
pub struct Channel {
    pub id: String,
    pub members: Vec<Member>,
}

impl Channel {
    /// Create an empty channel with the given id.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            members: Vec::new(),
        }
    }

    /// Add a client to the end of the membership list.
    ///
    /// Returns `false` if the client was already a member; its position is
    /// kept and only the version is refreshed.
    pub fn subscribe(&mut self, client_id: &str, version: &str) -> bool {
        if let Some(existing) = self.members.iter_mut().find(|m| m.client_id == client_id) {
            existing.version = version.to_string();
            return false;
        }
        self.members.push(Member {
            client_id: client_id.to_string(),
            version: version.to_string(),
        });
        true
    }

    /// Remove a client. Returns whether it was a member.
    pub fn unsubscribe(&mut self, client_id: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m.client_id != client_id);
        self.members.len() != before
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.members.iter().any(|m| m.client_id == client_id)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member ids in subscription order.
    pub fn member_ids(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.client_id.as_str())
    }
}
