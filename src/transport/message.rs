//! Wire protocol
//!
//! JSON frames exchanged with peers over WebSocket, tagged by `type`.
//! Rejections carry the broker's error text unchanged in `message`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tungstenite::protocol::Message as WsMessage;

use crate::broker::callback::ConnectionEvent;
use crate::broker::message::{ChannelSpec, Delivery, TargetClients};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "connect")]
    Connect { client_id: String },
    #[serde(rename = "subscribe")]
    Subscribe { channels: Vec<ChannelSpec> },
    #[serde(rename = "unsubscribe")]
    Unsubscribe { channels: Vec<ChannelSpec> },
    #[serde(rename = "publish")]
    Publish {
        channel_id: String,
        #[serde(default)]
        message_id: String,
        message_name: String,
        targets: TargetClients,
        #[serde(default)]
        data: Value,
    },
    #[serde(rename = "disconnect")]
    Disconnect {},
}

impl ClientMessage {
    pub fn op(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::Publish { .. } => "publish",
            Self::Disconnect {} => "disconnect",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "ok")]
    Ok { op: String },
    #[serde(rename = "published")]
    Published {
        message_id: String,
        deliveries: Vec<Delivery>,
    },
    #[serde(rename = "error")]
    Error { op: String, message: String },
    #[serde(rename = "message")]
    Message {
        source_client_id: String,
        channel_id: String,
        message_name: String,
        data: Value,
    },
    #[serde(rename = "client_connection")]
    ClientConnection {
        event: ConnectionEvent,
        client_id: String,
        channels: Vec<ChannelSpec>,
    },
}

impl ServerMessage {
    pub fn ok(op: &str) -> Self {
        Self::Ok { op: op.to_string() }
    }

    pub fn error(op: &str, message: impl ToString) -> Self {
        Self::Error {
            op: op.to_string(),
            message: message.to_string(),
        }
    }

    pub fn to_ws(&self) -> Result<WsMessage, serde_json::Error> {
        Ok(WsMessage::text(serde_json::to_string(self)?))
    }
}
