//! Plain-TCP server and connection registry for the HAP accessory
//! transport.
//!
//! Each accepted connection gets its own `tokio::spawn`-ed task that owns
//! a [`hap_core::ConnectionEngine`] exclusively and drives it through a
//! read-dispatch-write loop. The only state shared across tasks is the
//! [`registry::ConnectionRegistry`], guarded by a `tokio::sync::RwLock`,
//! used to look up a connection's outbound channel for out-of-band event
//! push.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod registry;
mod server;
pub mod system_env;

pub use error::ServerError;
pub use registry::ConnectionRegistry;
pub use server::{Server, ServerConfig, ServerHandle, ServerRuntimeConfig};
pub use system_env::SystemEnv;
