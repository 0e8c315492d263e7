//! Payload types shared by request and response messages.
//!
//! All structs use `#[serde(rename_all = "camelCase")]` and are encoded as
//! named `MsgPack` maps via `rmp_serde::to_vec_named()`.

use serde::{Deserialize, Serialize};

/// Error code for requests the client got wrong (bad pattern, bad message).
pub const ERROR_CODE_BAD_REQUEST: u32 = 400;

/// Error code for an internal fault. The server stops after reporting it.
pub const ERROR_CODE_INTERNAL: u32 = 500;

/// Error code when the server is shedding load.
pub const ERROR_CODE_OVERLOADED: u32 = 503;

/// Error code when an operation exceeded its timeout.
pub const ERROR_CODE_TIMEOUT: u32 = 504;

/// Payload for `ERROR` responses.
///
/// `code` follows HTTP status semantics so transports can reuse it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    /// Numeric error class.
    pub code: u32,
    /// Human-readable description.
    pub message: String,
}

impl ErrorPayload {
    /// Builds an error payload.
    #[must_use]
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Returns `true` when the error was caused by the request itself.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code)
    }
}
