//! The `transport` module exposes the broker to remote peers over
//! WebSockets.
//!
//! It defines the JSON protocol spoken with peers and the server that maps
//! each connection onto a broker client.

pub mod message;
pub mod websocket;

pub use message::{ClientMessage, ServerMessage};
pub use websocket::{Session, serve, start_websocket_server};

#[cfg(test)]
mod websocket_tests;
