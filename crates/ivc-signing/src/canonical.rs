//! Canonical signable payload construction.
//!
//! The counterparty verifies signatures against the exact byte string
//! `{"msg_type":"<type>","id":"<id>"}` with no whitespace. Both signing
//! paths must hash these bytes, so the string is built here rather than
//! through a serializer whose field ordering could drift.

/// Build the canonical payload for a message type and client id.
pub fn canonical_payload(msg_type: &str, id: &str) -> String {
    format!(r#"{{"msg_type":"{msg_type}","id":"{id}"}}"#)
}
