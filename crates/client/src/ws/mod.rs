//! Push channel for real-time events from the game server.
//!
//! This module provides:
//! - Connection management with flat-delay, unlimited auto-reconnect
//! - Ordered delivery of decoded [`PushEvent`](bunker_shared::PushEvent)s to subscribers
//! - A [`Connector`] seam so the socket implementation can be swapped
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────┐
//! │          WorldSession         │
//! │ (owns one channel per world)  │
//! └───────────────────────────────┘
//!                 │ subscribe()
//!                 ▼
//! ┌───────────────────────────────┐      ┌─────────────────────┐
//! │          PushChannel          │─────▶│      Connector      │
//! │ state machine + reconnect     │      │ (tungstenite / fake)│
//! └───────────────────────────────┘      └─────────────────────┘
//! ```

mod channel;
mod connector;

pub use channel::{ConnectionState, PushChannel};
pub use connector::{Connector, FrameStream, TungsteniteConnector};
