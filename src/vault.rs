//! Vault Messages
//!
//! Typed builders for the structs the ManekiVault contract hashes on-chain.
//! Each message knows its schema and value tree, so callers never hand-write
//! JSON for the vault.

use crate::config::SignerConfig;
use crate::eip712::{
    pre_image as hash_pre_image, sign_digest, verify_digest, Domain, FieldDef, PreImage,
    Signature, SigningKey, TypeSchema, TypedData,
};
use crate::error::TypedSignResult;
use crate::utils::crypto::to_checksum_address;
use ethers_core::types::{Address, U256};
use serde_json::{json, Value};

/// Domain name the vault contract hashes
pub const VAULT_DOMAIN_NAME: &str = "ManekiVault";

/// Domain version the vault contract hashes
pub const VAULT_DOMAIN_VERSION: &str = "1.0.0";

/// A struct the vault verifies signatures over
pub trait TypedMessage {
    /// Primary type name
    const TYPE_NAME: &'static str;

    /// The primary type and everything it references
    fn schema() -> TypeSchema;

    /// Value tree matching [`TypedMessage::schema`]
    fn to_value(&self) -> Value;
}

/// The vault's EIP-712 domain on a given chain
pub fn vault_domain(chain_id: u64, verifying_contract: Address) -> Domain {
    Domain::new(VAULT_DOMAIN_NAME, VAULT_DOMAIN_VERSION, chain_id, verifying_contract)
}

pub fn pre_image<M: TypedMessage>(domain: &Domain, message: &M) -> TypedSignResult<PreImage> {
    hash_pre_image(&M::schema(), M::TYPE_NAME, domain, &message.to_value())
}

pub fn signing_hash<M: TypedMessage>(domain: &Domain, message: &M) -> TypedSignResult<[u8; 32]> {
    Ok(pre_image(domain, message)?.digest)
}

pub fn sign_message<M: TypedMessage>(
    domain: &Domain,
    message: &M,
    key: &SigningKey,
    config: &SignerConfig,
) -> TypedSignResult<Signature> {
    sign_digest(&signing_hash(domain, message)?, key, config)
}

pub fn verify_message<M: TypedMessage>(
    domain: &Domain,
    message: &M,
    signature: &Signature,
    signer: &Address,
    config: &SignerConfig,
) -> TypedSignResult<bool> {
    verify_digest(&signing_hash(domain, message)?, signature, signer, config)
}

/// Wrap a message into the document wallets sign with `eth_signTypedData_v4`
pub fn typed_data<M: TypedMessage>(domain: &Domain, message: &M) -> TypedData {
    TypedData::new(M::schema(), M::TYPE_NAME, domain.clone(), message.to_value())
}

/// `TRANSFER(address to,uint256 amount,uint256 nonce)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub to: Address,
    pub amount: U256,
    pub nonce: U256,
}

impl Transfer {
    pub fn new(to: Address, amount: impl Into<U256>, nonce: impl Into<U256>) -> Self {
        Self {
            to,
            amount: amount.into(),
            nonce: nonce.into(),
        }
    }
}

impl TypedMessage for Transfer {
    const TYPE_NAME: &'static str = "TRANSFER";

    fn schema() -> TypeSchema {
        TypeSchema::new().with_type(
            Self::TYPE_NAME,
            vec![
                FieldDef::new("to", "address"),
                FieldDef::new("amount", "uint256"),
                FieldDef::new("nonce", "uint256"),
            ],
        )
    }

    fn to_value(&self) -> Value {
        json!({
            "to": to_checksum_address(self.to.as_bytes()),
            "amount": self.amount.to_string(),
            "nonce": self.nonce.to_string(),
        })
    }
}

/// What an approved request does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestType {
    /// Move `value` of the native token to `to`
    Transfer = 0,
    /// Call `to` with `data`
    Execute = 1,
}

impl RequestType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Approval request submitted to the vault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub requester: Address,
    pub to: Address,
    pub request_type: RequestType,
    pub value: U256,
    pub budget: U256,
    pub data: Vec<u8>,
    pub name: String,
    pub detail: String,
    pub attachments: String,
}

impl TypedMessage for Request {
    const TYPE_NAME: &'static str = "Request";

    fn schema() -> TypeSchema {
        TypeSchema::new().with_type(
            Self::TYPE_NAME,
            vec![
                FieldDef::new("requester", "address"),
                FieldDef::new("to", "address"),
                FieldDef::new("requestType", "uint8"),
                FieldDef::new("value", "uint256"),
                FieldDef::new("budget", "uint256"),
                FieldDef::new("data", "bytes"),
                FieldDef::new("name", "string"),
                FieldDef::new("detail", "string"),
                FieldDef::new("attachments", "string"),
            ],
        )
    }

    fn to_value(&self) -> Value {
        json!({
            "requester": to_checksum_address(self.requester.as_bytes()),
            "to": to_checksum_address(self.to.as_bytes()),
            "requestType": self.request_type.as_u8(),
            "value": self.value.to_string(),
            "budget": self.budget.to_string(),
            "data": format!("0x{}", hex::encode(&self.data)),
            "name": self.name,
            "detail": self.detail,
            "attachments": self.attachments,
        })
    }
}
