//! Error types for ivc-client.

use thiserror::Error;

/// Client-level errors surfaced to callers.
///
/// Transport drops are not errors: reconnection is automatic and visible
/// only through the per-channel connected flags. NAKs are data, delivered
/// through the registered handler.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(#[from] ivc_ws::WsError),

    #[error("Signing error: {0}")]
    Signing(#[from] ivc_signing::SignError),

    #[error("Quote {client_quote_id} timed out after {timeout_ms}ms")]
    QuoteTimeout {
        client_quote_id: String,
        timeout_ms: u64,
    },
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
