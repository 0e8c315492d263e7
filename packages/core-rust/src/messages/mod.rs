//! Wire message schemas for the Piscola RPC protocol.
//!
//! Every request and response is a [`Message`], internally tagged by a
//! `type` field and encoded as a named `MsgPack` map with camelCase field
//! names. Requests flow client to server; every request gets exactly one
//! response message.

pub mod base;

pub use base::{
    ErrorPayload, ERROR_CODE_BAD_REQUEST, ERROR_CODE_INTERNAL, ERROR_CODE_OVERLOADED,
    ERROR_CODE_TIMEOUT,
};

use serde::{Deserialize, Serialize};

use crate::query::{AdvancedQuery, Query, SearchResult};
use crate::types::{Item, ItemId};

/// A protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    // ----- requests -----
    /// Insert a new item. Answered with `ACK`.
    #[serde(rename = "ADD")]
    Add { item: Item },

    /// Insert or overwrite an item. Answered with `ACK`.
    #[serde(rename = "REPLACE")]
    Replace { item: Item },

    /// Remove an item by id. Answered with `ACK`.
    #[serde(rename = "REMOVE")]
    Remove { id: ItemId },

    /// Single-pattern lookup. Answered with `LOOKUP_RESP` or `ERROR`.
    #[serde(rename = "LOOKUP")]
    Lookup { query: Query },

    /// Multi-pattern lookup. Answered with `LOOKUP_RESP` or `ERROR`.
    #[serde(rename = "LOOKUP_ADVANCED")]
    LookupAdvanced { query: AdvancedQuery },

    /// Item count request. Answered with `SIZE_RESP`.
    #[serde(rename = "SIZE")]
    Size,

    // ----- responses -----
    /// Outcome of a mutation.
    #[serde(rename = "ACK")]
    Ack { success: bool },

    /// Outcome of a lookup.
    #[serde(rename = "LOOKUP_RESP")]
    LookupResp { result: SearchResult },

    /// Number of stored items, soft-deleted ones included.
    #[serde(rename = "SIZE_RESP")]
    SizeResp { size: u64 },

    /// Request failed.
    #[serde(rename = "ERROR")]
    Error { payload: ErrorPayload },
}

impl Message {
    /// Encodes the message as a named `MsgPack` map.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    /// Decodes a message from `MsgPack` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid message.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }

    /// Convenience constructor for `ERROR` responses.
    #[must_use]
    pub fn error(code: u32, message: impl Into<String>) -> Self {
        Self::Error {
            payload: ErrorPayload::new(code, message),
        }
    }

    /// Rust variant name, used in logs and classification errors.
    #[must_use]
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "Add",
            Self::Replace { .. } => "Replace",
            Self::Remove { .. } => "Remove",
            Self::Lookup { .. } => "Lookup",
            Self::LookupAdvanced { .. } => "LookupAdvanced",
            Self::Size => "Size",
            Self::Ack { .. } => "Ack",
            Self::LookupResp { .. } => "LookupResp",
            Self::SizeResp { .. } => "SizeResp",
            Self::Error { .. } => "Error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttrValue;

    #[test]
    fn add_roundtrip_with_attributes() {
        let msg = Message::Add {
            item: Item::new(2, 1000, "testing").with_attribute("foo", true),
        };
        let bytes = msg.to_msgpack().expect("serialize");
        let decoded = Message::from_msgpack(&bytes).expect("deserialize");
        assert_eq!(msg, decoded);
    }

    #[test]
    fn unit_variant_roundtrip() {
        let bytes = Message::Size.to_msgpack().unwrap();
        assert_eq!(Message::from_msgpack(&bytes).unwrap(), Message::Size);
    }

    #[test]
    fn serialized_contains_type_discriminator() {
        let msg = Message::LookupAdvanced {
            query: AdvancedQuery {
                include_patterns: vec!["*est*".into()],
                limit: 10,
                ..AdvancedQuery::default()
            },
        };
        let bytes = msg.to_msgpack().unwrap();
        let value: serde_json::Value = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(value["type"], "LOOKUP_ADVANCED");
        assert_eq!(value["query"]["includePatterns"][0], "*est*");
        assert_eq!(value["query"]["totalRequired"], false);
    }

    #[test]
    fn decodes_map_built_by_another_client() {
        // Mirrors what a non-Rust client would send: a plain map with camelCase keys.
        let raw = serde_json::json!({
            "type": "LOOKUP",
            "query": { "pattern": "*test*", "limit": 2, "totalRequired": true }
        });
        let bytes = rmp_serde::to_vec_named(&raw).unwrap();
        let msg = Message::from_msgpack(&bytes).unwrap();
        assert_eq!(
            msg,
            Message::Lookup {
                query: Query::new("*test*", 2).with_total()
            }
        );
    }

    #[test]
    fn decodes_string_and_bool_attributes() {
        let raw = serde_json::json!({
            "type": "REPLACE",
            "item": {
                "id": 4, "time": 9, "value": "v", "deleted": true,
                "attributes": { "pinned": false, "owner": "ops" }
            }
        });
        let bytes = rmp_serde::to_vec_named(&raw).unwrap();
        let Message::Replace { item } = Message::from_msgpack(&bytes).unwrap() else {
            panic!("expected REPLACE");
        };
        assert!(item.deleted);
        assert_eq!(item.attributes["pinned"], AttrValue::Bool(false));
        assert_eq!(item.attributes["owner"], AttrValue::from("ops"));
    }

    #[test]
    fn error_roundtrip() {
        let msg = Message::error(ERROR_CODE_BAD_REQUEST, "invalid pattern");
        let bytes = msg.to_msgpack().unwrap();
        let decoded = Message::from_msgpack(&bytes).unwrap();
        let Message::Error { payload } = decoded else {
            panic!("expected ERROR");
        };
        assert_eq!(payload.code, 400);
        assert!(payload.is_client_error());
    }

    #[test]
    fn unknown_type_fails_to_decode() {
        let raw = serde_json::json!({ "type": "EXPLODE" });
        let bytes = rmp_serde::to_vec_named(&raw).unwrap();
        assert!(Message::from_msgpack(&bytes).is_err());
    }

    #[test]
    fn variant_names_are_rust_names() {
        assert_eq!(Message::Size.variant_name(), "Size");
        assert_eq!(Message::SizeResp { size: 0 }.variant_name(), "SizeResp");
    }
}
