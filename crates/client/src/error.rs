//! Error types for the realtime core.

pub use bunker_shared::RpcError;

/// Failure to establish or keep the push connection.
///
/// Never surfaced to the user: the channel retries on its own.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("read failed: {0}")]
    Read(String),
    /// The channel was explicitly disconnected and will not connect again.
    #[error("channel disconnected")]
    Disconnected,
    /// The attempt was abandoned before it completed.
    #[error("connection attempt cancelled")]
    Cancelled,
}

/// Error returned by session operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("no world selected")]
    NoWorldSelected,
    /// Another `select_world` replaced this one before it finished.
    #[error("world selection superseded")]
    Superseded,
    #[error("invalid push endpoint: {0}")]
    Endpoint(String),
}

/// Failure while handling one push event. Logged and dropped by the dispatch
/// loop; it never stops later events from being handled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventHandlerError {
    #[error("event for session {event_epoch} arrived after session {current_epoch} started")]
    Stale { event_epoch: u64, current_epoch: u64 },
}
