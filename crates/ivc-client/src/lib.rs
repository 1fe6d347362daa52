//! Order/quote client for the index vault.
//!
//! Composes the lower crates into `IndexClient`:
//! - dual-channel transport (`ivc-ws`) with automatic reconnect
//! - signed order/quote submission (`ivc-signing`)
//! - fill/invoice correlation with late-subscriber replay
//! - quote request/response bridging and background price polling
//! - ACK/NAK handler slots

pub mod acks;
pub mod client;
pub mod config;
pub mod correlator;
pub mod error;
pub mod logging;
pub mod quotes;
pub mod router;

pub use acks::AckRouter;
pub use client::IndexClient;
pub use config::ClientConfig;
pub use correlator::OrderCorrelator;
pub use error::{ClientError, Result};
pub use logging::init_logging;
pub use quotes::QuoteBridge;
pub use router::InboundRouter;

// Commonly needed alongside the client API.
pub use ivc_core::{ClientOrderId, ClientQuoteId, Side, Symbol};
pub use ivc_signing::{KeyBackedSigner, LocalWalletProvider, OrderSigner, WalletSigner};
pub use ivc_ws::{AckKind, ChannelKind, ConnectionState, IndexQuoteResponse};
