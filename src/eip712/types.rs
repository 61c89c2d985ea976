//! EIP-712 Type Definitions
//!
//! Core data structures for EIP-712 typed data signing.

use super::encoder::{parse_address, parse_fixed_bytes, parse_uint};
use super::hasher::{typed_data_pre_image, PreImage};
use super::signer::{sign_typed_data, verify_typed_data, SigningKey};
use crate::config::SignerConfig;
use crate::error::{TypedSignError, TypedSignResult};
use crate::utils::crypto::{strip_hex_prefix, to_checksum_address};
use ethers_core::types::{Address, H256, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the struct type used for the domain separator
pub const DOMAIN_TYPE_NAME: &str = "EIP712Domain";

/// Keys permitted in a domain, in hashing order
pub const DOMAIN_FIELDS: [&str; 5] = ["name", "version", "chainId", "verifyingContract", "salt"];

/// Deepest array nesting accepted in a field type
pub const MAX_ARRAY_DEPTH: usize = 32;

/// Half of the secp256k1 group order; canonical signatures have `s <= SECP256K1_HALF_ORDER`
pub const SECP256K1_HALF_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

/// The secp256k1 group order
pub const SECP256K1_ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

/// A field in a struct type definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldDef {
    /// The name of the field
    pub name: String,
    /// The type of the field (e.g., "address", "uint256", "Person", "bytes32[]")
    #[serde(rename = "type")]
    pub type_name: String,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Struct type definitions: type name -> ordered fields
///
/// Field order is part of the encoding and is never changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct TypeSchema {
    types: BTreeMap<String, Vec<FieldDef>>,
}

impl TypeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with_type(mut self, name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        self.insert(name, fields);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, fields: Vec<FieldDef>) {
        self.types.insert(name.into(), fields);
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<FieldDef>> {
        self.types.remove(name)
    }

    pub fn fields(&self, name: &str) -> Option<&[FieldDef]> {
        self.types.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Validate every declared struct.
    ///
    /// Checks identifiers, field-name uniqueness, field types, undeclared
    /// references and dependency cycles.
    pub fn validate(&self) -> TypedSignResult<()> {
        for (name, fields) in &self.types {
            if !is_identifier(name) {
                return Err(TypedSignError::schema(format!("invalid type name `{}`", name)));
            }
            if parse_primitive(name).is_some() {
                return Err(TypedSignError::schema(format!(
                    "struct type `{}` shadows a primitive type",
                    name
                )));
            }
            for (i, field) in fields.iter().enumerate() {
                if !is_identifier(&field.name) {
                    return Err(TypedSignError::schema(format!(
                        "invalid field name `{}` in `{}`",
                        field.name, name
                    )));
                }
                if fields[..i].iter().any(|f| f.name == field.name) {
                    return Err(TypedSignError::schema(format!(
                        "duplicate field `{}` in `{}`",
                        field.name, name
                    )));
                }
                FieldType::parse(&field.type_name, self)?;
            }
        }

        for name in self.types.keys() {
            super::encoder::find_type_dependencies(self, name)?;
        }

        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

/// A parsed field type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Address,
    Bool,
    /// `uintN`, N in bits
    Uint(usize),
    /// `intN`, N in bits
    Int(usize),
    /// `bytesN`, N in bytes
    FixedBytes(usize),
    Bytes,
    String,
    /// Reference to a declared struct type
    Struct(String),
    /// `T[]` when `length` is `None`, `T[k]` otherwise
    Array {
        element: Box<FieldType>,
        length: Option<usize>,
    },
}

impl FieldType {
    /// Parse a type string against a schema.
    ///
    /// Fails with a schema error for malformed names and undeclared struct references.
    pub fn parse(type_name: &str, schema: &TypeSchema) -> TypedSignResult<Self> {
        // Outermost dimension first
        let mut dimensions = Vec::new();
        let mut base = type_name;
        while let Some(stripped) = base.strip_suffix(']') {
            if dimensions.len() == MAX_ARRAY_DEPTH {
                return Err(TypedSignError::schema(format!(
                    "array type nests deeper than {} dimensions",
                    MAX_ARRAY_DEPTH
                )));
            }
            let open = stripped.rfind('[').ok_or_else(|| {
                TypedSignError::schema(format!("malformed array type `{}`", type_name))
            })?;
            let length = match &stripped[open + 1..] {
                "" => None,
                digits => Some(parse_width(digits).ok_or_else(|| {
                    TypedSignError::schema(format!("invalid array length in `{}`", type_name))
                })?),
            };
            dimensions.push(length);
            base = &stripped[..open];
        }

        let mut parsed = if let Some(primitive) = parse_primitive(base) {
            primitive
        } else if schema.contains(base) {
            FieldType::Struct(base.to_string())
        } else {
            return Err(TypedSignError::schema(format!("undeclared type `{}`", base)));
        };

        for length in dimensions.into_iter().rev() {
            parsed = FieldType::Array {
                element: Box::new(parsed),
                length,
            };
        }
        Ok(parsed)
    }

    /// The struct type this field refers to, looking through arrays
    pub fn struct_name(&self) -> Option<&str> {
        match self {
            FieldType::Struct(name) => Some(name),
            FieldType::Array { element, .. } => element.struct_name(),
            _ => None,
        }
    }

    /// Fixed-size types encoded in place as one 32-byte word
    pub fn is_atomic(&self) -> bool {
        matches!(
            self,
            FieldType::Address
                | FieldType::Bool
                | FieldType::Uint(_)
                | FieldType::Int(_)
                | FieldType::FixedBytes(_)
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Address => write!(f, "address"),
            FieldType::Bool => write!(f, "bool"),
            FieldType::Uint(bits) => write!(f, "uint{}", bits),
            FieldType::Int(bits) => write!(f, "int{}", bits),
            FieldType::FixedBytes(size) => write!(f, "bytes{}", size),
            FieldType::Bytes => write!(f, "bytes"),
            FieldType::String => write!(f, "string"),
            FieldType::Struct(name) => write!(f, "{}", name),
            FieldType::Array { element, length: None } => write!(f, "{}[]", element),
            FieldType::Array {
                element,
                length: Some(n),
            } => write!(f, "{}[{}]", element, n),
        }
    }
}

/// Digits without sign or leading zero
fn parse_width(digits: &str) -> Option<usize> {
    if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Parse a primitive type name, `None` if it is not one
pub fn parse_primitive(type_name: &str) -> Option<FieldType> {
    match type_name {
        "address" => return Some(FieldType::Address),
        "bool" => return Some(FieldType::Bool),
        "string" => return Some(FieldType::String),
        "bytes" => return Some(FieldType::Bytes),
        _ => {}
    }

    if let Some(bits) = type_name.strip_prefix("uint") {
        return parse_width(bits)
            .filter(|n| *n <= 256 && n % 8 == 0)
            .map(FieldType::Uint);
    }
    if let Some(bits) = type_name.strip_prefix("int") {
        return parse_width(bits)
            .filter(|n| *n <= 256 && n % 8 == 0)
            .map(FieldType::Int);
    }
    if let Some(size) = type_name.strip_prefix("bytes") {
        return parse_width(size).filter(|n| *n <= 32).map(FieldType::FixedBytes);
    }

    None
}

/// Check if a type is an atomic (fixed-size) type
pub fn is_atomic_type(type_name: &str) -> bool {
    parse_primitive(type_name).is_some_and(|t| t.is_atomic())
}

/// Check if a type is a dynamic type
pub fn is_dynamic_type(type_name: &str) -> bool {
    type_name == "bytes" || type_name == "string"
}

/// The EIP-712 domain separator input
///
/// Absent fields are excluded from both the `EIP712Domain` type string and
/// the encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Domain {
    /// The human-readable name of the signing domain
    pub name: Option<String>,
    /// The current major version of the signing domain
    pub version: Option<String>,
    /// The EIP-155 chain ID
    pub chain_id: Option<U256>,
    /// The address of the contract that will verify the signature
    pub verifying_contract: Option<Address>,
    /// An optional disambiguating salt
    pub salt: Option<H256>,
}

impl Domain {
    /// Domain with the four commonly used fields
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        chain_id: u64,
        verifying_contract: Address,
    ) -> Self {
        Self {
            name: Some(name.into()),
            version: Some(version.into()),
            chain_id: Some(U256::from(chain_id)),
            verifying_contract: Some(verifying_contract),
            salt: None,
        }
    }

    pub fn with_salt(mut self, salt: H256) -> Self {
        self.salt = Some(salt);
        self
    }

    /// `EIP712Domain` fields for the slots that are present
    pub fn fields(&self) -> Vec<FieldDef> {
        let mut fields = Vec::new();

        if self.name.is_some() {
            fields.push(FieldDef::new("name", "string"));
        }
        if self.version.is_some() {
            fields.push(FieldDef::new("version", "string"));
        }
        if self.chain_id.is_some() {
            fields.push(FieldDef::new("chainId", "uint256"));
        }
        if self.verifying_contract.is_some() {
            fields.push(FieldDef::new("verifyingContract", "address"));
        }
        if self.salt.is_some() {
            fields.push(FieldDef::new("salt", "bytes32"));
        }

        fields
    }

    /// Single-type schema holding the derived `EIP712Domain`
    pub fn schema(&self) -> TypeSchema {
        TypeSchema::new().with_type(DOMAIN_TYPE_NAME, self.fields())
    }

    /// Value tree for the present slots
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();

        if let Some(ref name) = self.name {
            map.insert("name".into(), Value::String(name.clone()));
        }
        if let Some(ref version) = self.version {
            map.insert("version".into(), Value::String(version.clone()));
        }
        if let Some(chain_id) = self.chain_id {
            map.insert("chainId".into(), Value::String(chain_id.to_string()));
        }
        if let Some(contract) = self.verifying_contract {
            map.insert(
                "verifyingContract".into(),
                Value::String(to_checksum_address(contract.as_bytes())),
            );
        }
        if let Some(salt) = self.salt {
            map.insert(
                "salt".into(),
                Value::String(format!("0x{}", hex::encode(salt.as_bytes()))),
            );
        }

        Value::Object(map)
    }

    /// Parse a JSON domain object.
    ///
    /// Keys outside the five standard ones are rejected; `null` means absent.
    pub fn from_value(value: &Value) -> TypedSignResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| TypedSignError::value("domain must be a JSON object"))?;

        if let Some(extra) = obj.keys().find(|k| !DOMAIN_FIELDS.contains(&k.as_str())) {
            return Err(TypedSignError::schema(format!(
                "unsupported domain field `{}`",
                extra
            )));
        }

        let present = |key: &str| obj.get(key).filter(|v| !v.is_null());
        let string = |key: &str, v: &Value| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| TypedSignError::mismatch("string", format!("domain `{}` must be a string", key)))
        };

        Ok(Self {
            name: present("name").map(|v| string("name", v)).transpose()?,
            version: present("version").map(|v| string("version", v)).transpose()?,
            chain_id: present("chainId").map(|v| parse_uint(256, v)).transpose()?,
            verifying_contract: present("verifyingContract").map(parse_address).transpose()?,
            salt: present("salt")
                .map(|v| parse_fixed_bytes(32, v).map(H256::from))
                .transpose()?,
        })
    }
}

/// Complete EIP-712 typed data document, as exchanged with wallets
#[derive(Debug, Clone)]
pub struct TypedData {
    /// Type definitions (struct name -> fields)
    pub types: TypeSchema,
    /// The name of the primary type being signed
    pub primary_type: String,
    /// The EIP-712 domain
    pub domain: Domain,
    /// The actual message data to sign
    pub message: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTypedData {
    types: TypeSchema,
    primary_type: String,
    #[serde(default)]
    domain: Value,
    message: Value,
}

impl TypedData {
    pub fn new(types: TypeSchema, primary_type: impl Into<String>, domain: Domain, message: Value) -> Self {
        Self {
            types,
            primary_type: primary_type.into(),
            domain,
            message,
        }
    }

    /// Parse and validate typed data from a JSON string
    pub fn from_json(json: &str) -> TypedSignResult<Self> {
        let raw: RawTypedData = serde_json::from_str(json)?;
        let domain = match raw.domain {
            Value::Null => Domain::default(),
            ref value => Domain::from_value(value)?,
        };
        let typed_data = Self {
            types: raw.types,
            primary_type: raw.primary_type,
            domain,
            message: raw.message,
        };
        typed_data.validate()?;
        Ok(typed_data)
    }

    /// Serialize to the standard JSON form, `EIP712Domain` included
    pub fn to_json(&self) -> TypedSignResult<String> {
        let mut types = self.types.clone();
        types.insert(DOMAIN_TYPE_NAME, self.domain.fields());

        let document = serde_json::json!({
            "types": types,
            "primaryType": self.primary_type,
            "domain": self.domain.to_value(),
            "message": self.message,
        });
        Ok(serde_json::to_string(&document)?)
    }

    /// Validate the typed data structure
    pub fn validate(&self) -> TypedSignResult<()> {
        if self.primary_type == DOMAIN_TYPE_NAME {
            return Err(TypedSignError::schema(
                "primary type cannot be EIP712Domain",
            ));
        }
        if !self.types.contains(&self.primary_type) {
            return Err(TypedSignError::schema(format!(
                "primary type `{}` is not declared",
                self.primary_type
            )));
        }

        if let Some(declared) = self.types.fields(DOMAIN_TYPE_NAME) {
            if declared != self.domain.fields().as_slice() {
                return Err(TypedSignError::schema(
                    "declared EIP712Domain fields do not match the domain values",
                ));
            }
        }

        self.types.validate()
    }

    /// Domain separator, struct hash and digest
    pub fn pre_image(&self) -> TypedSignResult<PreImage> {
        typed_data_pre_image(self)
    }

    /// The 32-byte digest a wallet signs
    pub fn signing_hash(&self) -> TypedSignResult<[u8; 32]> {
        Ok(self.pre_image()?.digest)
    }

    pub fn sign(&self, key: &SigningKey, config: &SignerConfig) -> TypedSignResult<Signature> {
        sign_typed_data(self, key, config)
    }

    pub fn verify(
        &self,
        signature: &Signature,
        expected: &Address,
        config: &SignerConfig,
    ) -> TypedSignResult<bool> {
        verify_typed_data(self, signature, expected, config)
    }
}

/// ECDSA signature components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    /// r component (32 bytes)
    pub r: [u8; 32],
    /// s component (32 bytes)
    pub s: [u8; 32],
    /// v component (27/28, or 0/1 in raw form)
    pub v: u8,
}

impl Signature {
    pub fn new(r: [u8; 32], s: [u8; 32], v: u8) -> Self {
        Self { r, s, v }
    }

    /// Create from 65-byte signature (r || s || v)
    pub fn from_bytes(bytes: &[u8]) -> TypedSignResult<Self> {
        if bytes.len() != 65 {
            return Err(TypedSignError::signature_format(format!(
                "expected 65 bytes, got {}",
                bytes.len()
            )));
        }

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[0..32]);
        s.copy_from_slice(&bytes[32..64]);

        Ok(Self { r, s, v: bytes[64] })
    }

    pub fn from_hex(s: &str) -> TypedSignResult<Self> {
        let bytes = hex::decode(strip_hex_prefix(s.trim()))
            .map_err(|e| TypedSignError::signature_format(format!("invalid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Convert to 65-byte representation (r || s || v)
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[0..32].copy_from_slice(&self.r);
        bytes[32..64].copy_from_slice(&self.s);
        bytes[64] = self.v;
        bytes
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    /// Normalized 0/1 recovery id
    pub fn recovery_id(&self) -> TypedSignResult<u8> {
        match self.v {
            0 | 1 => Ok(self.v),
            27 | 28 => Ok(self.v - 27),
            v => Err(TypedSignError::signature_format(format!(
                "recovery id v={} is outside {{0, 1, 27, 28}}",
                v
            ))),
        }
    }

    /// `true` when `s` is in the lower half of the curve order
    pub fn is_low_s(&self) -> bool {
        self.s <= SECP256K1_HALF_ORDER
    }

    /// `r` and `s` are non-zero and below the curve order
    pub fn has_valid_scalars(&self) -> bool {
        let zero = [0u8; 32];
        self.r != zero && self.s != zero && self.r < SECP256K1_ORDER && self.s < SECP256K1_ORDER
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Signature::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
