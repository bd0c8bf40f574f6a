//! WebSocket transport
//!
//! This file implements the WebSocket front end of the broker. Each
//! connection stands in for one embedded frame. Responsibilities:
//! - Validate the `Origin` header of every upgrade request against the
//!   broker's accepted origins (requests without one are non-browser peers
//!   and are let through)
//! - Refuse connections beyond `max_connections`
//! - Translate protocol JSON messages into broker operations through a
//!   per-connection [`Session`]
//! - Disconnect the bound client when the socket closes

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_tungstenite::accept_hdr_async;
use tracing::{debug, error, info, warn};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tungstenite::http::header::ORIGIN;
use tungstenite::protocol::Message as WsMessage;

use crate::broker::MessageBroker;
use crate::client::ClientHandle;
use crate::config::Settings;
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::utils::error::{BrokerError, TransportError};

/// Broker state of one WebSocket connection.
///
/// A connection binds to at most one client id, set by a successful
/// `connect`. Every other operation acts on that id.
#[derive(Debug)]
pub struct Session {
    broker: MessageBroker,
    sender: UnboundedSender<WsMessage>,
    client_id: Option<String>,
}

impl Session {
    pub fn new(broker: MessageBroker, sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            broker,
            sender,
            client_id: None,
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Apply one client request and build the reply frame.
    pub fn handle(&mut self, msg: ClientMessage) -> ServerMessage {
        let op = msg.op();
        match self.apply(msg) {
            Ok(reply) => reply,
            Err(err) => ServerMessage::error(op, err),
        }
    }

    fn apply(&mut self, msg: ClientMessage) -> Result<ServerMessage, BrokerError> {
        let op = msg.op();
        match msg {
            ClientMessage::Connect { client_id } => {
                if let Some(bound) = &self.client_id {
                    let err = BrokerError::AlreadyConnected;
                    error!("connect rejected for client '{client_id}': session already bound to '{bound}': {err}");
                    return Err(err);
                }
                self.broker.connect(&client_id)?;
                info!("{client_id} connected");
                self.client_id = Some(client_id);
            }
            ClientMessage::Subscribe { channels } => {
                let client_id = self.bound()?;
                let handle = ClientHandle::new(client_id.clone(), self.sender.clone());
                self.broker
                    .subscribe(&client_id, &channels, handle.clone(), handle)?;
            }
            ClientMessage::Unsubscribe { channels } => {
                let client_id = self.bound()?;
                self.broker.unsubscribe(&client_id, &channels)?;
            }
            ClientMessage::Publish {
                channel_id,
                message_id,
                message_name,
                targets,
                data,
            } => {
                let client_id = self.bound()?;
                let outcome = self.broker.publish(
                    &channel_id,
                    &client_id,
                    &message_id,
                    &message_name,
                    targets,
                    data,
                )?;
                return Ok(ServerMessage::Published {
                    message_id: outcome.message_id,
                    deliveries: outcome.deliveries,
                });
            }
            ClientMessage::Disconnect {} => {
                let client_id = self.bound()?;
                self.broker.disconnect(&client_id)?;
                info!("{client_id} disconnected");
                self.client_id = None;
            }
        }
        Ok(ServerMessage::ok(op))
    }

    fn bound(&self) -> Result<String, BrokerError> {
        self.client_id.clone().ok_or(BrokerError::NotConnected)
    }

    /// Evict the bound client, if any. Called when the socket closes, and
    /// runs even while the broker is disabled.
    pub fn close(&mut self) {
        if let Some(client_id) = self.client_id.take() {
            match self.broker.evict(&client_id) {
                Ok(()) => info!("{client_id} disconnected on close"),
                Err(e) => error!("Failed to disconnect {client_id} on close: {e}"),
            }
        }
    }
}

/// Bind `addr` and serve until the listener fails.
pub async fn start_websocket_server(
    addr: String,
    broker: MessageBroker,
    settings: Settings,
) -> Result<(), TransportError> {
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| TransportError::Bind {
            addr: addr.clone(),
            source,
        })?;

    info!("WebSocket server listening on ws://{addr}");
    serve(listener, broker, settings.broker.max_connections).await;
    Ok(())
}

/// Accept connections on an already bound listener.
pub async fn serve(listener: TcpListener, broker: MessageBroker, max_connections: usize) {
    let active = Arc::new(AtomicUsize::new(0));

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Failed to accept connection: {e}");
                break;
            }
        };

        if active.fetch_add(1, Ordering::SeqCst) >= max_connections {
            active.fetch_sub(1, Ordering::SeqCst);
            warn!("Refusing {peer}: connection limit of {max_connections} reached");
            drop(stream);
            continue;
        }

        let broker = broker.clone();
        let active = active.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, broker).await {
                warn!("Connection from {peer} ended with error: {e}");
            }
            active.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

#[allow(clippy::result_large_err)]
fn check_origin(broker: &MessageBroker, req: &Request, resp: Response) -> Result<Response, ErrorResponse> {
    let Some(origin) = req.headers().get(ORIGIN) else {
        return Ok(resp);
    };

    match origin.to_str() {
        Ok(origin) if broker.is_origin_accepted(origin) => Ok(resp),
        _ => {
            warn!("Rejecting WebSocket upgrade from origin {origin:?}");
            let mut rejection = ErrorResponse::new(Some("origin not accepted".to_string()));
            *rejection.status_mut() = StatusCode::FORBIDDEN;
            Err(rejection)
        }
    }
}

async fn handle_connection(stream: TcpStream, broker: MessageBroker) -> Result<(), TransportError> {
    let origin_broker = broker.clone();
    let ws_stream = accept_hdr_async(stream, move |req: &Request, resp: Response| {
        check_origin(&origin_broker, req, resp)
    })
    .await?;

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let mut session = Session::new(broker, tx.clone());

    // broker -> peer
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = ws_sender.send(msg).await {
                debug!("Send loop stopped: {e}");
                break;
            }
        }
    });

    while let Some(frame) = ws_receiver.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Read loop stopped: {e}");
                break;
            }
        };
        let text = match frame {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };

        let reply = match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(msg) => session.handle(msg),
            Err(err) => {
                warn!(
                    "Invalid client message: {err} | {}",
                    text.as_str().chars().take(100).collect::<String>()
                );
                ServerMessage::error("parse", err)
            }
        };

        let frame = match reply.to_ws() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to encode reply: {e}");
                break;
            }
        };
        if tx.send(frame).is_err() {
            break;
        }
    }

    session.close();
    Ok(())
}
