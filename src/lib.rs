//! Vault Signer Library
//!
//! EIP-712 typed structured data hashing, signing and verification for the
//! ManekiVault contract and any other EIP-712 verifier.
//!
//! # Architecture
//!
//! This crate provides:
//! - **eip712**: type encoding, struct hashing, domain separator, digest,
//!   secp256k1 signing and recovery
//! - **vault**: typed builders for the vault's `TRANSFER` and `Request` messages
//! - **config**: low-s policy and `v` format
//! - **error**: the error enum shared by every stage
//! - **utils**: keccak, EIP-55 checksums and redacting logger
//!
//! # Security
//!
//! Private keys are held in `zeroize` buffers and are never logged; addresses,
//! digests and signatures are shortened in log output.
//!
//! # Example
//!
//! ```rust,ignore
//! use vault_signer::config::SignerConfig;
//! use vault_signer::eip712::SigningKey;
//! use vault_signer::vault::{sign_message, vault_domain, Transfer};
//!
//! let key = SigningKey::from_hex(private_key_hex)?;
//! let domain = vault_domain(31337, vault_address);
//! let transfer = Transfer::new(recipient, 500_000_000_000_000_000u64, 1u64);
//! let signature = sign_message(&domain, &transfer, &key, &SignerConfig::default())?;
//! println!("{}", signature.to_hex());
//! ```

pub mod config;
pub mod eip712;
pub mod error;
pub mod utils;
pub mod vault;

pub use config::{LowSPolicy, RecoveryFormat, SignerConfig};
pub use eip712::{
    Domain, FieldDef, PreImage, Signature, SigningKey, StructHasher, TypeSchema, TypedData,
};
pub use error::{ErrorCode, ErrorReport, TypedSignError, TypedSignResult};
pub use utils::crypto::{keccak256, to_checksum_address};
pub use vault::{Request, RequestType, Transfer, TypedMessage};
