//! Shared types for the bunker client and server: world and bunker models,
//! the push-channel protocol, and the structured RPC error.

pub mod error;
pub mod models;
pub mod protocol;

pub use error::*;
pub use models::*;
pub use protocol::*;
