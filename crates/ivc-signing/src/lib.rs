//! Payload signing and sender verification for the index vault client.
//!
//! Outbound order/quote mutations are signed over a canonical byte string;
//! the sender address is verified locally by public-key recovery before any
//! message is sent. See `signer` for the two signing paths.

pub mod canonical;
pub mod error;
pub mod signer;

pub use canonical::canonical_payload;
pub use error::{Result, SignError};
pub use signer::{
    KeyBackedSigner, LocalWalletProvider, OrderSigner, SignedTrailer, WalletProvider, WalletSigner,
};
