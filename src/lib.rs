//! # framebus
//!
//! `framebus` is an in-memory message broker for embedded frames and host
//! modules. Clients connect under a unique id, subscribe to versioned
//! channels, and publish messages either to named peers or to everyone else
//! on a channel. Peers are told when clients join or leave their channels,
//! and cross-document traffic is restricted to an allow-list of origins.
//!
//! ## Core Modules
//!
//! - `broker`: The channel registry, precondition checks, and dispatch.
//! - `client`: The broker-side endpoint of a remote peer.
//! - `config`: Loading server and broker configuration.
//! - `transport`: The WebSocket server and its JSON protocol.
//! - `utils`: Error types and logging setup.
//!
//! ## Example
//!
//! ```rust
//! use framebus::broker::{ChannelSpec, ConnectionEvent, MessageBroker, TargetClients};
//! use serde_json::{Value, json};
//!
//! let broker = MessageBroker::new("http://localhost:8080");
//! let channels = [ChannelSpec::new("ch1", "1.0")];
//! let ignore = |_: ConnectionEvent, _: &str, _: &[ChannelSpec]| {};
//!
//! broker.connect("a").unwrap();
//! broker
//!     .subscribe("a", &channels, |_: &str, _: &str, _: &str, _: &Value| Value::Null, ignore)
//!     .unwrap();
//! broker.connect("b").unwrap();
//! broker
//!     .subscribe("b", &channels, |src: &str, _: &str, _: &str, _: &Value| json!(src), ignore)
//!     .unwrap();
//!
//! let outcome = broker
//!     .publish("ch1", "a", "m1", "greet", TargetClients::Broadcast, json!({}))
//!     .unwrap();
//! assert_eq!(outcome.get("b"), Some(&json!("a")));
//! ```

pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;
