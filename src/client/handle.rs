//! Client representation
//!
//! `ClientHandle` pairs a broker client id with the sending side of a
//! per-connection channel. The transport owns the receiving side and writes
//! whatever arrives to the socket.

use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;
use tungstenite::protocol::Message as WsMessage;

use crate::broker::callback::{ConnectionCallback, ConnectionEvent, MessageCallback};
use crate::broker::message::ChannelSpec;
use crate::transport::message::ServerMessage;

#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub id: String,
    pub sender: UnboundedSender<WsMessage>,
}

impl ClientHandle {
    pub fn new(id: impl Into<String>, sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: id.into(),
            sender,
        }
    }

    /// Queue a frame for the peer. Returns `false` if the frame could not be
    /// serialized or the connection is gone.
    pub fn send(&self, message: &ServerMessage) -> bool {
        let frame = match message.to_ws() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to serialize frame for {}: {e}", self.id);
                return false;
            }
        };
        if let Err(e) = self.sender.send(frame) {
            warn!("Failed to queue frame for {}: {e}", self.id);
            return false;
        }
        true
    }
}

impl MessageCallback for ClientHandle {
    fn on_message(
        &self,
        source_client_id: &str,
        channel_id: &str,
        message_name: &str,
        data: &Value,
    ) -> Value {
        let delivered = self.send(&ServerMessage::Message {
            source_client_id: source_client_id.to_string(),
            channel_id: channel_id.to_string(),
            message_name: message_name.to_string(),
            data: data.clone(),
        });
        json!({ "delivered": delivered })
    }
}

impl ConnectionCallback for ClientHandle {
    fn on_client_connection(&self, event: ConnectionEvent, client_id: &str, channels: &[ChannelSpec]) {
        self.send(&ServerMessage::ClientConnection {
            event,
            client_id: client_id.to_string(),
            channels: channels.to_vec(),
        });
    }
}
