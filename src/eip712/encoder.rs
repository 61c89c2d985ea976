//! EIP-712 Type Encoding
//!
//! Type strings, type hashes and the 32-byte encoding of atomic values.

use super::types::{FieldDef, FieldType, TypeSchema};
use crate::error::{TypedSignError, TypedSignResult};
use crate::utils::crypto::{keccak256, strip_hex_prefix, to_checksum_address};
use ethers_core::types::{Address, U256};
use serde_json::Value;
use std::collections::BTreeSet;

/// Encode a type string for a struct type
/// Format: "TypeName(type1 name1,type2 name2,...)" followed by every
/// transitively referenced struct, sorted by name
pub fn encode_type(schema: &TypeSchema, type_name: &str) -> TypedSignResult<String> {
    let dependencies = find_type_dependencies(schema, type_name)?;

    let mut result = format_type_string(type_name, declared_fields(schema, type_name)?);

    for dep in dependencies.iter().filter(|dep| dep.as_str() != type_name) {
        result.push_str(&format_type_string(dep, declared_fields(schema, dep)?));
    }

    Ok(result)
}

fn declared_fields<'a>(schema: &'a TypeSchema, type_name: &str) -> TypedSignResult<&'a [FieldDef]> {
    schema
        .fields(type_name)
        .ok_or_else(|| TypedSignError::schema(format!("undeclared type `{}`", type_name)))
}

/// Format a single type string
fn format_type_string(type_name: &str, fields: &[FieldDef]) -> String {
    let field_strs: Vec<String> = fields
        .iter()
        .map(|f| format!("{} {}", f.type_name, f.name))
        .collect();

    format!("{}({})", type_name, field_strs.join(","))
}

/// Find all struct types reachable from `type_name`, itself included.
///
/// Walks the reference graph depth-first with an explicit stack. A reference
/// back to a type still on the stack is a cycle and is rejected, as is any
/// reference to an undeclared type.
pub fn find_type_dependencies(
    schema: &TypeSchema,
    type_name: &str,
) -> TypedSignResult<BTreeSet<String>> {
    declared_fields(schema, type_name)?;

    let mut finished = BTreeSet::new();
    // (type, index of the next field to visit)
    let mut path: Vec<(String, usize)> = vec![(type_name.to_string(), 0)];

    while let Some((current, next)) = path.last().cloned() {
        let fields = declared_fields(schema, &current)?;

        if next == fields.len() {
            path.pop();
            finished.insert(current);
            continue;
        }
        if let Some(top) = path.last_mut() {
            top.1 += 1;
        }

        let field = &fields[next];
        let field_type = FieldType::parse(&field.type_name, schema).map_err(|e| match e {
            TypedSignError::Schema(msg) => {
                TypedSignError::schema(format!("{} (field `{}.{}`)", msg, current, field.name))
            }
            other => other,
        })?;

        let Some(dep) = field_type.struct_name() else {
            continue;
        };

        if path.iter().any(|(name, _)| name == dep) {
            let cycle = path
                .iter()
                .map(|(name, _)| name.as_str())
                .chain(std::iter::once(dep))
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(TypedSignError::schema(format!(
                "cyclic type dependency: {}",
                cycle
            )));
        }

        if !finished.contains(dep) {
            path.push((dep.to_string(), 0));
        }
    }

    Ok(finished)
}

/// Calculate the type hash for a struct type
/// typeHash = keccak256(encodeType(typeOf(s)))
pub fn type_hash(schema: &TypeSchema, type_name: &str) -> TypedSignResult<[u8; 32]> {
    let encoded = encode_type(schema, type_name)?;
    Ok(keccak256(encoded.as_bytes()))
}

/// Encode an atomic value into one 32-byte word
pub fn encode_atomic(field_type: &FieldType, value: &Value) -> TypedSignResult<[u8; 32]> {
    let mut word = [0u8; 32];

    match field_type {
        // 20 bytes, left-padded
        FieldType::Address => {
            let address = parse_address(value)?;
            word[12..].copy_from_slice(address.as_bytes());
        }
        FieldType::Bool => {
            let b = value.as_bool().ok_or_else(|| {
                TypedSignError::mismatch("bool", format!("expected boolean, got {}", describe(value)))
            })?;
            word[31] = u8::from(b);
        }
        FieldType::Uint(bits) => parse_uint(*bits, value)?.to_big_endian(&mut word),
        FieldType::Int(bits) => word = parse_int(*bits, value)?,
        FieldType::FixedBytes(size) => word = parse_fixed_bytes(*size, value)?,
        other => {
            return Err(TypedSignError::schema(format!(
                "`{}` is not an atomic type",
                other
            )))
        }
    }

    Ok(word)
}

/// Parse an Ethereum address from a hex string.
///
/// All-lowercase and all-uppercase digits are accepted as-is; mixed case
/// must carry a valid EIP-55 checksum.
pub fn parse_address(value: &Value) -> TypedSignResult<Address> {
    let s = value.as_str().ok_or_else(|| {
        TypedSignError::mismatch("address", format!("expected hex string, got {}", describe(value)))
    })?;
    parse_address_str(s)
}

pub fn parse_address_str(s: &str) -> TypedSignResult<Address> {
    let digits = strip_hex_prefix(s.trim());

    if digits.len() != 40 {
        return Err(TypedSignError::mismatch(
            "address",
            format!("expected 40 hex digits, got {}", digits.len()),
        ));
    }

    let bytes = hex::decode(digits)
        .map_err(|e| TypedSignError::mismatch("address", format!("invalid hex: {}", e)))?;

    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && to_checksum_address(&bytes)[2..] != *digits {
        return Err(TypedSignError::mismatch(
            "address",
            format!("`{}` has an invalid EIP-55 checksum", s),
        ));
    }

    Ok(Address::from_slice(&bytes))
}

/// Parse an unsigned integer of `bits` width.
///
/// Accepts JSON integers, decimal strings and `0x` hex strings.
pub fn parse_uint(bits: usize, value: &Value) -> TypedSignResult<U256> {
    let type_name = format!("uint{}", bits);

    let n = match value {
        Value::Number(n) => n.as_u64().map(U256::from).ok_or_else(|| {
            TypedSignError::mismatch(&type_name, format!("{} is not a non-negative integer", n))
        })?,
        Value::String(s) => parse_u256_str(s).ok_or_else(|| {
            TypedSignError::mismatch(&type_name, format!("`{}` is not an unsigned integer", s))
        })?,
        other => {
            return Err(TypedSignError::mismatch(
                &type_name,
                format!("expected integer, got {}", describe(other)),
            ))
        }
    };

    if n.bits() > bits {
        return Err(TypedSignError::mismatch(
            &type_name,
            format!("value {} exceeds {} bits", n, bits),
        ));
    }

    Ok(n)
}

/// Parse a signed integer of `bits` width into its two's-complement word
pub fn parse_int(bits: usize, value: &Value) -> TypedSignResult<[u8; 32]> {
    let type_name = format!("int{}", bits);

    let (negative, magnitude) = match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                (false, U256::from(u))
            } else if let Some(i) = n.as_i64() {
                (i < 0, U256::from(i.unsigned_abs()))
            } else {
                return Err(TypedSignError::mismatch(
                    &type_name,
                    format!("{} is not an integer", n),
                ));
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            let (negative, digits) = match trimmed.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, trimmed),
            };
            let magnitude = parse_u256_str(digits).ok_or_else(|| {
                TypedSignError::mismatch(&type_name, format!("`{}` is not an integer", s))
            })?;
            (negative, magnitude)
        }
        other => {
            return Err(TypedSignError::mismatch(
                &type_name,
                format!("expected integer, got {}", describe(other)),
            ))
        }
    };

    // -2^(bits-1) <= value <= 2^(bits-1) - 1
    let limit = U256::from(2u64).pow(U256::from(bits as u64 - 1));
    let out_of_range = if negative {
        magnitude > limit
    } else {
        magnitude >= limit
    };
    if out_of_range {
        let sign = if negative { "-" } else { "" };
        return Err(TypedSignError::mismatch(
            &type_name,
            format!("value {}{} is out of range", sign, magnitude),
        ));
    }

    let encoded = if negative && !magnitude.is_zero() {
        (!magnitude).overflowing_add(U256::one()).0
    } else {
        magnitude
    };

    let mut word = [0u8; 32];
    encoded.to_big_endian(&mut word);
    Ok(word)
}

/// Decimal or `0x` hex, no sign
fn parse_u256_str(s: &str) -> Option<U256> {
    let s = s.trim();

    if let Some(hex_digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if hex_digits.is_empty() || !hex_digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let significant = hex_digits.trim_start_matches('0');
        if significant.is_empty() {
            return Some(U256::zero());
        }
        if significant.len() > 64 {
            return None;
        }
        return U256::from_str_radix(significant, 16).ok();
    }

    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    U256::from_dec_str(s).ok()
}

/// Parse a `bytesN` value; exactly `size` bytes, right-padded to 32
pub fn parse_fixed_bytes(size: usize, value: &Value) -> TypedSignResult<[u8; 32]> {
    let type_name = format!("bytes{}", size);
    let bytes = parse_hex(&type_name, value)?;

    if bytes.len() != size {
        return Err(TypedSignError::mismatch(
            &type_name,
            format!("expected {} bytes, got {}", size, bytes.len()),
        ));
    }

    let mut word = [0u8; 32];
    word[..size].copy_from_slice(&bytes);
    Ok(word)
}

/// Parse a hex string (with or without 0x prefix)
pub fn parse_hex(type_name: &str, value: &Value) -> TypedSignResult<Vec<u8>> {
    let s = value.as_str().ok_or_else(|| {
        TypedSignError::mismatch(type_name, format!("expected hex string, got {}", describe(value)))
    })?;

    hex::decode(strip_hex_prefix(s.trim()))
        .map_err(|e| TypedSignError::mismatch(type_name, format!("invalid hex: {}", e)))
}

/// JSON kind, for error messages
pub(crate) fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
