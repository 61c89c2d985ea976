//! EIP-712 Typed Data Signing
//!
//! Implementation of EIP-712 typed structured data hashing and signing.
//!
//! # Reference
//! - <https://eips.ethereum.org/EIPS/eip-712>
//!
//! # Example
//! ```rust,ignore
//! use vault_signer::eip712::{TypedData, SigningKey, sign_typed_data};
//! use vault_signer::config::SignerConfig;
//!
//! let typed_data = TypedData::from_json(json_string)?;
//! let key = SigningKey::from_hex(private_key_hex)?;
//! let signature = sign_typed_data(&typed_data, &key, &SignerConfig::default())?;
//! ```

pub mod types;
pub mod encoder;
pub mod hasher;
pub mod signer;

pub use types::*;
pub use encoder::{encode_type, find_type_dependencies, type_hash};
pub use hasher::*;
pub use signer::*;

#[cfg(test)]
mod tests;
