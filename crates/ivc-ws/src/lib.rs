//! Dual-channel WebSocket transport for the index vault client.
//!
//! Provides:
//! - One connection per protocol channel (quotes, orders)
//! - Automatic reconnection with capped exponential backoff
//! - Per-channel sequence numbering with counterparty resync
//! - Lenient inbound classification and channel-tagged forwarding

pub mod connection;
pub mod error;
pub mod message;
pub mod sequence;

pub use connection::{backoff_delay, ChannelConnection, ConnectionState};
pub use error::{WsError, WsResult};
pub use message::{
    extract_msg_type, extract_ref_seq_num, parse_inbound, AckKind, AckMessage, ChannelKind,
    InboundMessage, IndexOrderFill, IndexQuoteResponse, MintInvoice, MsgType, NakMessage,
    OrderMessage, ParsedFrame, QuoteMessage, StandardHeader, StandardTrailer, WireMessage,
};
pub use sequence::SequenceCounter;

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
