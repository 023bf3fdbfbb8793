//! Push-channel protocol and RPC path conventions.

use serde::{Deserialize, Serialize};
use url::Url;

/// Marker header sent with every RPC request; the server rejects calls
/// without it.
pub const HEADER_RPC_MARKER: &str = "X-Underground-Tomorrow";

/// Query parameter carrying the bunker's broadcast identifier on the push URL.
pub const BROADCAST_ID_PARAM: &str = "broadcast_id";

/// A short in-world radio message relayed to every bunker in a world.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Broadcast {
    #[serde(rename = "bunker")]
    pub bunker_number: i32,
    #[serde(rename = "name")]
    pub sender_name: String,
    #[serde(rename = "message")]
    pub text: String,
}

/// One event frame received on the push channel.
///
/// On the wire the unit variants are bare strings (`"Tick"`) and the
/// broadcast is an object keyed by its tag (`{"Broadcast": {...}}`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PushEvent {
    /// Cached bunker state should be refreshed.
    Tick,
    /// An expedition finished; expedition-related views should reload.
    #[serde(rename = "Expedition")]
    ExpeditionResolved,
    /// A new message was delivered to the bunker.
    #[serde(rename = "Message")]
    MessageArrived,
    Broadcast(Broadcast),
}

impl PushEvent {
    /// Decode one text frame.
    pub fn from_frame(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }
}

/// Build the push endpoint URL for a bunker: `<base>?broadcast_id=<id>`.
pub fn broadcast_url(base: &str, broadcast_id: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base)?;
    url.query_pairs_mut()
        .append_pair(BROADCAST_ID_PARAM, broadcast_id);
    Ok(url)
}

/// RPC path for a world-scoped call, e.g. `world/3/get_bunker`.
pub fn world_path(world_id: i32, method: &str) -> String {
    format!("world/{}/{}", world_id, method)
}

/// RPC path for a lobby call, e.g. `lobby/join_world`.
pub fn lobby_path(method: &str) -> String {
    format!("lobby/{}", method)
}
