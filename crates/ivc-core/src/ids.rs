//! Client-side order and quote identifiers.
//!
//! Ids are derived deterministically from the submission context
//! (timestamp, sender address, chain, per-channel sequence) so a given
//! submission always maps to the same id. Format: `AAA-BBB-CCC-NNNN`,
//! three uppercase letter groups plus a numeric suffix in [1001, 9999].

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Derive a client id from the submission context.
///
/// The concatenated inputs are SHA-256 hashed; digest bytes 0..18 yield
/// nine letters (big-endian byte pair mod 26), bytes 18..22 yield the
/// numeric suffix.
pub fn derive_client_id(timestamp_ms: i64, address: &str, chain_id: u64, seq: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(timestamp_ms.to_string().as_bytes());
    hasher.update(address.as_bytes());
    hasher.update(chain_id.to_string().as_bytes());
    hasher.update(seq.to_string().as_bytes());
    let digest = hasher.finalize();

    let mut id = String::with_capacity(16);
    for i in 0..9 {
        if i == 3 || i == 6 {
            id.push('-');
        }
        let pair = u16::from_be_bytes([digest[2 * i], digest[2 * i + 1]]);
        id.push((b'A' + (pair % 26) as u8) as char);
    }

    let suffix_seed = u32::from_be_bytes([digest[18], digest[19], digest[20], digest[21]]);
    let suffix = 1001 + (suffix_seed % 8999);
    id.push('-');
    id.push_str(&suffix.to_string());
    id
}

/// Client order ID echoed by the counterparty on fills and invoices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientOrderId(String);

impl ClientOrderId {
    /// Create from an existing string (for parsing responses).
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClientOrderId {
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

impl AsRef<str> for ClientOrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Client quote ID correlating quote requests with responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientQuoteId(String);

impl ClientQuoteId {
    /// Create from an existing string (for parsing responses).
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientQuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClientQuoteId {
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

impl AsRef<str> for ClientQuoteId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
