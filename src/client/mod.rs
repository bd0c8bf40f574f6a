//! The `client` module defines the broker-side endpoint of a remote peer.
//!
//! A [`ClientHandle`] is what a transport registers as the message and
//! connection callbacks of a subscription: every delivery is serialized into
//! a [`ServerMessage`](crate::transport::message::ServerMessage) frame and
//! queued on the peer's outbound channel.

pub mod handle;
pub use handle::ClientHandle;
