//! Connection engine and handler bridge for the HAP accessory transport.
//!
//! The [`connection::ConnectionEngine`] is a sans-IO state machine: it
//! accepts inbound bytes and produces [`connection::ConnectionAction`]s for
//! a separate executor to carry out (write bytes to a socket, await a
//! deferred handler response, or close the connection). It never performs
//! I/O itself, which is what makes it possible to unit test without a
//! network.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
pub mod env;
pub mod error;
pub mod handler;

pub use connection::{ConnectionAction, ConnectionConfig, ConnectionEngine, ConnectionPhase};
pub use env::Environment;
pub use error::ConnectionError;
pub use handler::{AccessoryHandler, HandlerError, HandlerResponse, PendingBody, ResponseBody};
