//! The `utils` module provides definitions shared across `framebus`:
//! the error types and logging setup.

pub mod error;
pub mod logging;

pub use error::{BrokerError, TransportError};
