//! The `error` module defines the error types used within `framebus`.
//!
//! Broker rejections render as fixed human-readable strings. Peers that sit
//! on the other side of a frame boundary pattern-match on that text, so the
//! `Display` output of [`BrokerError`] is part of the public contract.

use thiserror::Error;

/// Reasons a broker operation is rejected.
///
/// All variants are validation failures raised before any state is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("Missing required parameter client id")]
    MissingClientId,

    #[error("Missing required parameter(s)")]
    MissingParameters,

    #[error("Client is already connected")]
    AlreadyConnected,

    #[error("Client is not connected")]
    NotConnected,

    #[error("Client is not subscribed to the provided channel")]
    NotSubscribed,

    #[error("Unknown channel Id: {0}")]
    UnknownChannel(String),

    #[error("Target client(s) not found in the provided channel")]
    TargetNotFound,

    #[error("Message broker is disabled")]
    Disabled,
}

/// Failures of the WebSocket transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("invalid frame: {0}")]
    Serialization(#[from] serde_json::Error),
}
