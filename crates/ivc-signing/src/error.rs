//! Error types for ivc-signing.

use alloy::primitives::Address;
use thiserror::Error;

/// Signing and verification errors.
#[derive(Debug, Error)]
pub enum SignError {
    #[error("Failed to decode hex: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Signing failed: {0}")]
    SigningFailed(#[from] alloy::signers::Error),

    #[error("Invalid signature length: expected {expected}, got {actual}")]
    InvalidSignatureLength { expected: usize, actual: usize },

    #[error("Public key recovery failed: {0}")]
    RecoveryFailed(String),

    #[error("Recovered address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: Address, actual: Address },

    #[error("Wallet provider error: {0}")]
    Wallet(String),
}

/// Result type alias for signing operations.
pub type Result<T> = std::result::Result<T, SignError>;
