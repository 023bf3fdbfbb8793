//! Bunker Client - realtime session core
//!
//! This crate keeps a game client in sync with one selected world: it loads
//! the world and the player's bunker over RPC, keeps a push channel open for
//! server events, runs the simulated world clock, and exposes the resulting
//! state as observable values for whatever UI sits on top.

#[macro_use]
pub mod logging;

pub mod api_client;
pub mod clock;
pub mod config;
pub mod error;
pub mod resource;
pub mod session;
pub mod ws;

#[cfg(feature = "dioxus")]
pub mod hooks;

#[cfg(test)]
mod testing;

pub use api_client::{call, no_args, ApiClient, RpcClient};
pub use config::ClientConfig;
pub use error::{EventHandlerError, RpcError, SessionError, TransportError};
pub use resource::{LoadState, Resource};
pub use session::WorldSession;
pub use ws::{ConnectionState, Connector, PushChannel, TungsteniteConnector};
