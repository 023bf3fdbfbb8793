//! Structured RPC error shared by every request/response call.

use serde::{Deserialize, Serialize};

/// Code used when the server could not be reached or its error body could not
/// be decoded.
pub const CODE_CONNECTION_ERROR: &str = "CONNECTION_ERROR";

/// Code used when the server answered with a non-string error body.
pub const CODE_UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

/// Code used when a successful response did not match the expected shape.
pub const CODE_INVALID_RESPONSE: &str = "INVALID_RESPONSE";

/// Error returned by a command call.
///
/// `code` is the server's machine-readable error string (e.g.
/// `"WORLD_NOT_FOUND"`); presentation code translates it for the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("RPC failed with {status} {status_text}: {code}")]
pub struct RpcError {
    pub status: u16,
    pub status_text: String,
    pub code: String,
}

impl RpcError {
    pub fn new(status: u16, status_text: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            code: code.into(),
        }
    }

    /// The server was unreachable.
    pub fn connection_error(detail: impl Into<String>) -> Self {
        Self::new(0, detail, CODE_CONNECTION_ERROR)
    }

    /// A 2xx response body did not decode into the expected type.
    pub fn invalid_response(status: u16, detail: impl Into<String>) -> Self {
        Self::new(status, detail, CODE_INVALID_RESPONSE)
    }

    /// Interpret the body of a non-2xx response.
    ///
    /// The server sends its error code as a JSON string. Any other JSON value
    /// becomes [`CODE_UNKNOWN_ERROR`]; a body that is not JSON at all becomes
    /// [`CODE_CONNECTION_ERROR`].
    pub fn from_response(status: u16, status_text: impl Into<String>, body: &str) -> Self {
        let code = match serde_json::from_str::<serde_json::Value>(body) {
            Ok(serde_json::Value::String(code)) => code,
            Ok(_) => CODE_UNKNOWN_ERROR.to_string(),
            Err(_) => CODE_CONNECTION_ERROR.to_string(),
        };
        Self::new(status, status_text, code)
    }

    pub fn is_connection_error(&self) -> bool {
        self.code == CODE_CONNECTION_ERROR
    }
}
