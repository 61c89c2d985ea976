//! EIP-712 Hashing
//!
//! Struct hashing, the domain separator and the final signing digest.

use super::encoder::{describe, encode_atomic, parse_hex, type_hash};
use super::types::*;
use crate::error::{TypedSignError, TypedSignResult};
use crate::log_debug;
use crate::utils::crypto::keccak256;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// Magic prefix for EIP-712 encoding
pub const EIP712_PREFIX: &[u8] = b"\x19\x01";

/// Hashes struct values against one schema.
///
/// Type hashes are memoized per type name; concurrent readers share the
/// cache and a racing insert keeps the first value (both are identical).
#[derive(Debug)]
pub struct StructHasher<'a> {
    schema: &'a TypeSchema,
    type_hashes: RwLock<HashMap<String, [u8; 32]>>,
}

impl<'a> StructHasher<'a> {
    pub fn new(schema: &'a TypeSchema) -> Self {
        Self {
            schema,
            type_hashes: RwLock::new(HashMap::new()),
        }
    }

    pub fn schema(&self) -> &TypeSchema {
        self.schema
    }

    /// Memoized `keccak256(encodeType(type_name))`
    pub fn type_hash(&self, type_name: &str) -> TypedSignResult<[u8; 32]> {
        if let Ok(cache) = self.type_hashes.read() {
            if let Some(hash) = cache.get(type_name) {
                return Ok(*hash);
            }
        }

        let hash = type_hash(self.schema, type_name)?;
        log_debug!(
            "eip712",
            "computed type hash",
            type_name = type_name,
            hash = hex::encode(hash)
        );

        if let Ok(mut cache) = self.type_hashes.write() {
            cache.entry(type_name.to_string()).or_insert(hash);
        }
        Ok(hash)
    }

    /// Hash a struct according to EIP-712
    ///
    /// hashStruct(s) = keccak256(typeHash || encodeData(s))
    pub fn hash_struct(&self, type_name: &str, value: &Value) -> TypedSignResult<[u8; 32]> {
        Ok(keccak256(&self.encode_data(type_name, value)?))
    }

    /// `typeHash || enc(field_1) || ... || enc(field_n)` in declaration order
    pub fn encode_data(&self, type_name: &str, value: &Value) -> TypedSignResult<Vec<u8>> {
        // Resolves the full dependency graph first, so cycles and undeclared
        // references fail before any value is touched.
        let type_hash = self.type_hash(type_name)?;

        let fields = self
            .schema
            .fields(type_name)
            .ok_or_else(|| TypedSignError::schema(format!("undeclared type `{}`", type_name)))?;

        let obj = value.as_object().ok_or_else(|| {
            TypedSignError::value(format!(
                "expected object for `{}`, got {}",
                type_name,
                describe(value)
            ))
        })?;

        if let Some(extra) = obj.keys().find(|k| !fields.iter().any(|f| &f.name == *k)) {
            return Err(TypedSignError::value(format!(
                "unexpected field `{}.{}`",
                type_name, extra
            )));
        }

        let mut encoded = Vec::with_capacity(32 * (fields.len() + 1));
        encoded.extend_from_slice(&type_hash);

        for field in fields {
            let field_value = obj.get(&field.name).ok_or_else(|| {
                TypedSignError::value(format!("missing field `{}.{}`", type_name, field.name))
            })?;
            let field_type = FieldType::parse(&field.type_name, self.schema)?;

            let word = self
                .encode_field(&field_type, field_value)
                .map_err(|e| in_field(e, type_name, &field.name))?;
            encoded.extend_from_slice(&word);
        }

        Ok(encoded)
    }

    /// Encode one field value into its 32-byte slot
    fn encode_field(&self, field_type: &FieldType, value: &Value) -> TypedSignResult<[u8; 32]> {
        match field_type {
            FieldType::Struct(name) => self.hash_struct(name, value),
            FieldType::String => {
                let s = value.as_str().ok_or_else(|| {
                    TypedSignError::mismatch("string", format!("expected string, got {}", describe(value)))
                })?;
                Ok(keccak256(s.as_bytes()))
            }
            FieldType::Bytes => Ok(keccak256(&parse_hex("bytes", value)?)),
            FieldType::Array { element, length } => {
                let items = value.as_array().ok_or_else(|| {
                    TypedSignError::mismatch(
                        field_type.to_string(),
                        format!("expected array, got {}", describe(value)),
                    )
                })?;
                if let Some(expected) = length {
                    if items.len() != *expected {
                        return Err(TypedSignError::mismatch(
                            field_type.to_string(),
                            format!("expected {} elements, got {}", expected, items.len()),
                        ));
                    }
                }

                let mut concatenated = Vec::with_capacity(32 * items.len());
                for item in items {
                    concatenated.extend_from_slice(&self.encode_field(element, item)?);
                }
                Ok(keccak256(&concatenated))
            }
            atomic => encode_atomic(atomic, value),
        }
    }
}

/// Attach the field path to mismatch errors
fn in_field(err: TypedSignError, type_name: &str, field: &str) -> TypedSignError {
    match err {
        TypedSignError::TypeMismatch {
            type_name: expected,
            reason,
        } if !reason.starts_with("field `") => TypedSignError::TypeMismatch {
            type_name: expected,
            reason: format!("field `{}.{}`: {}", type_name, field, reason),
        },
        other => other,
    }
}

/// Calculate the domain separator hash
///
/// domainSeparator = hashStruct(eip712Domain), with `EIP712Domain` derived
/// from the fields that are present
pub fn domain_separator(domain: &Domain) -> TypedSignResult<[u8; 32]> {
    let schema = domain.schema();
    StructHasher::new(&schema).hash_struct(DOMAIN_TYPE_NAME, &domain.to_value())
}

/// keccak256("\x19\x01" || domainSeparator || structHash)
pub fn signing_digest(domain_separator: &[u8; 32], struct_hash: &[u8; 32]) -> [u8; 32] {
    let mut data = Vec::with_capacity(2 + 32 + 32);
    data.extend_from_slice(EIP712_PREFIX);
    data.extend_from_slice(domain_separator);
    data.extend_from_slice(struct_hash);
    keccak256(&data)
}

/// The pre-image components (for external signing)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreImage {
    pub domain_separator: [u8; 32],
    pub struct_hash: [u8; 32],
    pub digest: [u8; 32],
}

impl PreImage {
    /// Build from the two hashed halves
    pub fn new(domain_separator: [u8; 32], struct_hash: [u8; 32]) -> Self {
        Self {
            domain_separator,
            struct_hash,
            digest: signing_digest(&domain_separator, &struct_hash),
        }
    }

    pub fn hex(&self) -> PreImageHex {
        PreImageHex {
            domain_separator: format!("0x{}", hex::encode(self.domain_separator)),
            struct_hash: format!("0x{}", hex::encode(self.struct_hash)),
            digest: format!("0x{}", hex::encode(self.digest)),
        }
    }
}

/// Hex view of [`PreImage`], printed by the CLI
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreImageHex {
    pub domain_separator: String,
    pub struct_hash: String,
    pub digest: String,
}

/// Hash `message` as `primary_type` under `schema` and `domain`
pub fn pre_image(
    schema: &TypeSchema,
    primary_type: &str,
    domain: &Domain,
    message: &Value,
) -> TypedSignResult<PreImage> {
    let domain_separator = domain_separator(domain)?;
    let struct_hash = StructHasher::new(schema).hash_struct(primary_type, message)?;
    let pre_image = PreImage::new(domain_separator, struct_hash);

    log_debug!(
        "eip712",
        "computed signing digest",
        primary_type = primary_type,
        separator = hex::encode(pre_image.domain_separator),
        digest = hex::encode(pre_image.digest)
    );

    Ok(pre_image)
}

/// Calculate the pre-image components for a typed-data document
pub fn typed_data_pre_image(typed_data: &TypedData) -> TypedSignResult<PreImage> {
    typed_data.validate()?;
    pre_image(
        &typed_data.types,
        &typed_data.primary_type,
        &typed_data.domain,
        &typed_data.message,
    )
}

/// Calculate the final EIP-712 hash for signing
///
/// hash = keccak256("\x19\x01" || domainSeparator || hashStruct(message))
pub fn hash_typed_data(typed_data: &TypedData) -> TypedSignResult<[u8; 32]> {
    Ok(typed_data_pre_image(typed_data)?.digest)
}
