//! Core domain types for the index vault client.
//!
//! This crate provides fundamental types used throughout the client:
//! - `Side`, `Symbol`: trading primitives with wire encodings
//! - `ClientOrderId`, `ClientQuoteId`: deterministic hash-derived identifiers
//! - `CoreError`: shared error taxonomy for domain parsing

pub mod error;
pub mod ids;
pub mod types;

pub use error::{CoreError, Result};
pub use ids::{derive_client_id, ClientOrderId, ClientQuoteId};
pub use types::{Side, Symbol};
