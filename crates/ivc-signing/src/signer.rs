//! Order signing and sender verification.
//!
//! Every outbound order/quote mutation carries a `SignedTrailer` proving the
//! sender controls the claimed address. Two signing paths exist:
//!
//! 1. `KeyBackedSigner` — a private key held in-process. Signs the SHA-256
//!    of the canonical payload directly; the wire carries a compact 64-byte
//!    (r,s) signature.
//! 2. `WalletSigner` — an external wallet reached through a `WalletProvider`.
//!    The wallet personal-signs the canonical string (EIP-191), returning a
//!    65-byte (r,s,v) signature whose recovery byte is normalized here.
//!
//! Both paths recover the public key locally and compare the derived address
//! to the claimed sender before anything is sent. A mismatch is an error and
//! the message never leaves the process.

use alloy::primitives::{eip191_hash_message, Address, PrimitiveSignature, B256, U256};
use alloy::signers::k256::ecdsa::VerifyingKey;
use alloy::signers::k256::elliptic_curve::sec1::ToEncodedPoint;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::utils::public_key_to_address;
use alloy::signers::Signer as AlloySigner;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::canonical::canonical_payload;
use crate::error::{Result, SignError};

/// Signature material attached to outbound messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTrailer {
    /// Uncompressed SEC1 public key (65 bytes, 0x04 prefix).
    pub public_key: Vec<u8>,
    /// Compact (r,s) for the key-backed path, (r,s,v) for the wallet path.
    pub signature: Vec<u8>,
}

/// Capability to sign the canonical payload for a message.
#[async_trait]
pub trait OrderSigner: Send + Sync {
    /// Address the counterparty will verify against.
    fn address(&self) -> Address;

    /// Sign the canonical payload for `msg_type` and `id`.
    async fn sign_order(&self, msg_type: &str, id: &str) -> Result<SignedTrailer>;
}

/// Recover the public key from (hash, signature) and verify the derived
/// address matches the claimed sender. Fails closed on any mismatch.
fn recover_and_verify(
    hash: &B256,
    signature: &PrimitiveSignature,
    expected: Address,
) -> Result<VerifyingKey> {
    let key = signature
        .recover_from_prehash(hash)
        .map_err(|e| SignError::RecoveryFailed(e.to_string()))?;
    let actual = public_key_to_address(&key);
    if actual != expected {
        return Err(SignError::AddressMismatch { expected, actual });
    }
    Ok(key)
}

fn uncompressed_public_key(key: &VerifyingKey) -> Vec<u8> {
    key.to_encoded_point(false).as_bytes().to_vec()
}

// =============================================================================
// Key-backed path
// =============================================================================

/// Signer over a private key held in-process.
///
/// Never log key material or signatures at debug level.
pub struct KeyBackedSigner {
    signer: PrivateKeySigner,
}

impl KeyBackedSigner {
    /// Parse a hex private key (0x prefix and surrounding whitespace allowed).
    ///
    /// # Errors
    /// Returns `SignError` if hex decoding fails, the key is invalid, or the
    /// derived address does not match `expected_address`.
    pub fn from_hex(hex_key: &str, expected_address: Option<Address>) -> Result<Self> {
        let trimmed = hex_key.trim().trim_start_matches("0x");
        let secret_bytes: Zeroizing<Vec<u8>> = Zeroizing::new(hex::decode(trimmed)?);
        Self::from_slice(&secret_bytes, expected_address)
    }

    /// Build from raw key bytes, verifying the derived address if provided.
    pub fn from_slice(secret_bytes: &[u8], expected_address: Option<Address>) -> Result<Self> {
        let signer = PrivateKeySigner::from_slice(secret_bytes)
            .map_err(|e| SignError::InvalidKey(e.to_string()))?;

        if let Some(expected) = expected_address {
            if signer.address() != expected {
                return Err(SignError::AddressMismatch {
                    expected,
                    actual: signer.address(),
                });
            }
        }

        Ok(Self { signer })
    }
}

#[async_trait]
impl OrderSigner for KeyBackedSigner {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn sign_order(&self, msg_type: &str, id: &str) -> Result<SignedTrailer> {
        let payload = canonical_payload(msg_type, id);
        let hash = B256::from_slice(&Sha256::digest(payload.as_bytes()));

        let signature = self.signer.sign_hash(&hash).await?;
        let key = recover_and_verify(&hash, &signature, self.signer.address())?;

        let mut compact = Vec::with_capacity(64);
        compact.extend_from_slice(&signature.r().to_be_bytes::<32>());
        compact.extend_from_slice(&signature.s().to_be_bytes::<32>());

        Ok(SignedTrailer {
            public_key: uncompressed_public_key(&key),
            signature: compact,
        })
    }
}

// =============================================================================
// Wallet-backed path
// =============================================================================

/// External wallet capable of EIP-191 personal signing.
///
/// Implementations wrap whatever transport reaches the wallet; the client
/// only needs the claimed address and the raw 65-byte signature.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Address the wallet claims to control.
    fn address(&self) -> Address;

    /// Personal-sign the message, returning 65 bytes (r,s,v).
    async fn personal_sign(&self, message: &str) -> Result<Vec<u8>>;
}

/// Signer delegating to an external wallet.
pub struct WalletSigner<P: WalletProvider> {
    provider: P,
}

impl<P: WalletProvider> WalletSigner<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P: WalletProvider> OrderSigner for WalletSigner<P> {
    fn address(&self) -> Address {
        self.provider.address()
    }

    async fn sign_order(&self, msg_type: &str, id: &str) -> Result<SignedTrailer> {
        let payload = canonical_payload(msg_type, id);
        let raw = self.provider.personal_sign(&payload).await?;
        if raw.len() != 65 {
            return Err(SignError::InvalidSignatureLength {
                expected: 65,
                actual: raw.len(),
            });
        }

        // Wallets disagree on the recovery byte: some return 27/28, others
        // the raw parity 0/1.
        let v = raw[64];
        let parity = if v >= 27 { v - 27 } else { v & 1 };
        let signature = PrimitiveSignature::new(
            U256::from_be_slice(&raw[0..32]),
            U256::from_be_slice(&raw[32..64]),
            parity == 1,
        );

        let hash = eip191_hash_message(payload.as_bytes());
        let key = recover_and_verify(&hash, &signature, self.provider.address())?;

        Ok(SignedTrailer {
            public_key: uncompressed_public_key(&key),
            signature: raw,
        })
    }
}

/// In-process `WalletProvider` over a local private key.
///
/// Stands in for an interactive wallet in automated flows and tests.
pub struct LocalWalletProvider {
    signer: PrivateKeySigner,
}

impl LocalWalletProvider {
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let trimmed = hex_key.trim().trim_start_matches("0x");
        let secret_bytes: Zeroizing<Vec<u8>> = Zeroizing::new(hex::decode(trimmed)?);
        let signer = PrivateKeySigner::from_slice(&secret_bytes)
            .map_err(|e| SignError::InvalidKey(e.to_string()))?;
        Ok(Self { signer })
    }
}

#[async_trait]
impl WalletProvider for LocalWalletProvider {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn personal_sign(&self, message: &str) -> Result<Vec<u8>> {
        let signature = self.signer.sign_message(message.as_bytes()).await?;
        let mut raw = Vec::with_capacity(65);
        raw.extend_from_slice(&signature.r().to_be_bytes::<32>());
        raw.extend_from_slice(&signature.s().to_be_bytes::<32>());
        raw.push(27 + u8::from(signature.v()));
        Ok(raw)
    }
}
