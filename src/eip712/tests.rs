//! EIP-712 Test Suite
//!
//! End-to-end vectors plus the failure modes of each stage.

use super::*;
use crate::config::SignerConfig;
use crate::error::TypedSignError;
use crate::utils::crypto::keccak256;
use ethers_core::types::U256;
use serde_json::json;

const MAIL_JSON: &str = r#"{
    "types": {
        "EIP712Domain": [
            {"name": "name", "type": "string"},
            {"name": "version", "type": "string"},
            {"name": "chainId", "type": "uint256"},
            {"name": "verifyingContract", "type": "address"}
        ],
        "Person": [
            {"name": "name", "type": "string"},
            {"name": "wallet", "type": "address"}
        ],
        "Mail": [
            {"name": "from", "type": "Person"},
            {"name": "to", "type": "Person"},
            {"name": "contents", "type": "string"}
        ]
    },
    "primaryType": "Mail",
    "domain": {
        "name": "Ether Mail",
        "version": "1",
        "chainId": 1,
        "verifyingContract": "0xCcCCccccCCCCcCCCCCCcCcCccCcCCCcCcccccccC"
    },
    "message": {
        "from": {
            "name": "Cow",
            "wallet": "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826"
        },
        "to": {
            "name": "Bob",
            "wallet": "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB"
        },
        "contents": "Hello, Bob!"
    }
}"#;

fn mail() -> TypedData {
    TypedData::from_json(MAIL_JSON).unwrap()
}

/// The private key behind the Mail example's `from` wallet
fn cow_key() -> SigningKey {
    SigningKey::from_bytes(&keccak256(b"cow")).unwrap()
}

fn flip_s(signature: &Signature) -> Signature {
    let n = U256::from_big_endian(&SECP256K1_ORDER);
    let s = U256::from_big_endian(&signature.s);
    let mut flipped = *signature;
    (n - s).to_big_endian(&mut flipped.s);
    flipped.v = if signature.v == 27 { 28 } else { 27 };
    flipped
}

/// The canonical Mail example from EIP-712
#[test]
fn test_eip712_mail_example() {
    let typed_data = mail();

    assert_eq!(
        encode_type(&typed_data.types, "Mail").unwrap(),
        "Mail(Person from,Person to,string contents)Person(string name,address wallet)"
    );
    assert_eq!(
        hex::encode(type_hash(&typed_data.types, "Mail").unwrap()),
        "a0cedeb2dc280ba39b857546d74f5549c3a1d7bdc2dd96bf881f76108e23dac2"
    );
    assert_eq!(
        hex::encode(hash_typed_data(&typed_data).unwrap()),
        "be609aee343fb3c4b28e1df9e632fca64fcfaede20f02e86244efddf30957bd2"
    );
}

#[test]
fn test_eip712_mail_signature_vector() {
    let key = cow_key();
    assert_eq!(
        key.checksum_address(),
        "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826"
    );

    let signature = sign_typed_data(&mail(), &key, &SignerConfig::default()).unwrap();
    assert_eq!(signature.v, 28);
    assert_eq!(
        hex::encode(signature.r),
        "4355c47d63924e8a72e509b65029052eb6c299d53a04e167c5775fd466751c9d"
    );
    assert_eq!(
        hex::encode(signature.s),
        "07299936d304c153f6443dfa05f40ff007d72911b6f72307f996231605b91562"
    );
}

/// Test Uniswap-style Permit message
#[test]
fn test_eip712_permit() {
    let json = r#"{
        "types": {
            "EIP712Domain": [
                {"name": "name", "type": "string"},
                {"name": "version", "type": "string"},
                {"name": "chainId", "type": "uint256"},
                {"name": "verifyingContract", "type": "address"}
            ],
            "Permit": [
                {"name": "owner", "type": "address"},
                {"name": "spender", "type": "address"},
                {"name": "value", "type": "uint256"},
                {"name": "nonce", "type": "uint256"},
                {"name": "deadline", "type": "uint256"}
            ]
        },
        "primaryType": "Permit",
        "domain": {
            "name": "Uniswap V2",
            "version": "1",
            "chainId": 1,
            "verifyingContract": "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D"
        },
        "message": {
            "owner": "0x1234567890123456789012345678901234567890",
            "spender": "0x0987654321098765432109876543210987654321",
            "value": "1000000000000000000",
            "nonce": 0,
            "deadline": 1893456000
        }
    }"#;

    let typed_data = TypedData::from_json(json).unwrap();
    let key = SigningKey::random();
    let config = SignerConfig::default();

    let signature = sign_typed_data(&typed_data, &key, &config).unwrap();
    assert!(verify_typed_data(&typed_data, &signature, &key.address(), &config).unwrap());
}

/// Test with nested struct arrays
#[test]
fn test_eip712_struct_arrays() {
    let json = r#"{
        "types": {
            "EIP712Domain": [
                {"name": "name", "type": "string"},
                {"name": "chainId", "type": "uint256"}
            ],
            "Item": [
                {"name": "id", "type": "uint256"},
                {"name": "name", "type": "string"}
            ],
            "Order": [
                {"name": "items", "type": "Item[]"},
                {"name": "buyer", "type": "address"}
            ]
        },
        "primaryType": "Order",
        "domain": {
            "name": "Marketplace",
            "chainId": 1
        },
        "message": {
            "items": [
                {"id": 1, "name": "Widget"},
                {"id": 2, "name": "Gadget"}
            ],
            "buyer": "0x1234567890123456789012345678901234567890"
        }
    }"#;

    let typed_data = TypedData::from_json(json).unwrap();
    assert_eq!(
        encode_type(&typed_data.types, "Order").unwrap(),
        "Order(Item[] items,address buyer)Item(uint256 id,string name)"
    );

    let hasher = StructHasher::new(&typed_data.types);
    let widget = hasher.hash_struct("Item", &json!({"id": 1, "name": "Widget"})).unwrap();
    let gadget = hasher.hash_struct("Item", &json!({"id": 2, "name": "Gadget"})).unwrap();

    let encoded = hasher.encode_data("Order", &typed_data.message).unwrap();
    assert_eq!(&encoded[32..64], &keccak256(&[widget, gadget].concat()));
}

/// Test OpenSea-style order
#[test]
fn test_eip712_seaport_order() {
    let json = r#"{
        "types": {
            "EIP712Domain": [
                {"name": "name", "type": "string"},
                {"name": "version", "type": "string"},
                {"name": "chainId", "type": "uint256"},
                {"name": "verifyingContract", "type": "address"}
            ],
            "OrderComponents": [
                {"name": "offerer", "type": "address"},
                {"name": "zone", "type": "address"},
                {"name": "orderType", "type": "uint8"},
                {"name": "startTime", "type": "uint256"},
                {"name": "endTime", "type": "uint256"},
                {"name": "zoneHash", "type": "bytes32"},
                {"name": "salt", "type": "uint256"},
                {"name": "conduitKey", "type": "bytes32"},
                {"name": "counter", "type": "uint256"}
            ]
        },
        "primaryType": "OrderComponents",
        "domain": {
            "name": "Seaport",
            "version": "1.1",
            "chainId": 1,
            "verifyingContract": "0x00000000006c3852cbEf3e08E8dF289169EdE581"
        },
        "message": {
            "offerer": "0x1234567890123456789012345678901234567890",
            "zone": "0x0000000000000000000000000000000000000000",
            "orderType": 0,
            "startTime": 1640000000,
            "endTime": 1893456000,
            "zoneHash": "0x0000000000000000000000000000000000000000000000000000000000000000",
            "salt": "12345",
            "conduitKey": "0x0000000000000000000000000000000000000000000000000000000000000000",
            "counter": 0
        }
    }"#;

    let typed_data = TypedData::from_json(json).unwrap();
    let mut too_wide = typed_data.clone();
    too_wide.message["orderType"] = json!(256);

    assert!(hash_typed_data(&typed_data).is_ok());
    assert!(matches!(
        hash_typed_data(&too_wide),
        Err(TypedSignError::TypeMismatch { ref type_name, .. }) if type_name == "uint8"
    ));
}

/// Test invalid primary type
#[test]
fn test_eip712_invalid_primary_type() {
    let json = r#"{
        "types": {
            "EIP712Domain": [
                {"name": "name", "type": "string"}
            ],
            "Person": [
                {"name": "name", "type": "string"}
            ]
        },
        "primaryType": "NonExistent",
        "domain": {"name": "Test"},
        "message": {}
    }"#;

    assert!(matches!(
        TypedData::from_json(json),
        Err(TypedSignError::Schema(_))
    ));
}

#[test]
fn test_declared_domain_must_match_values() {
    let mut document: serde_json::Value = serde_json::from_str(MAIL_JSON).unwrap();
    document["domain"]
        .as_object_mut()
        .unwrap()
        .remove("version");

    let err = TypedData::from_json(&document.to_string()).unwrap_err();
    assert!(matches!(err, TypedSignError::Schema(_)));
}

#[test]
fn test_cyclic_types_rejected_before_hashing() {
    let json = r#"{
        "types": {
            "Node": [
                {"name": "value", "type": "uint256"},
                {"name": "children", "type": "Node[]"}
            ]
        },
        "primaryType": "Node",
        "domain": {"name": "Tree"},
        "message": {"value": 1, "children": []}
    }"#;

    assert!(matches!(
        TypedData::from_json(json),
        Err(TypedSignError::Schema(ref msg)) if msg.contains("cyclic")
    ));
}

#[test]
fn test_key_order_does_not_matter() {
    let typed_data = mail();
    let mut reordered = typed_data.clone();
    reordered.message = json!({
        "contents": "Hello, Bob!",
        "to": {
            "wallet": "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB",
            "name": "Bob"
        },
        "from": {
            "wallet": "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826",
            "name": "Cow"
        }
    });

    assert_eq!(
        hash_typed_data(&typed_data).unwrap(),
        hash_typed_data(&reordered).unwrap()
    );
}

#[test]
fn test_tampered_message_fails_verification() {
    let typed_data = mail();
    let key = cow_key();
    let config = SignerConfig::default();
    let signature = sign_typed_data(&typed_data, &key, &config).unwrap();

    let mut tampered = typed_data.clone();
    tampered.message["contents"] = json!("Hello, Bob?");

    assert!(verify_typed_data(&typed_data, &signature, &key.address(), &config).unwrap());
    assert!(!verify_typed_data(&tampered, &signature, &key.address(), &config).unwrap());
}

#[test]
fn test_signature_bound_to_domain() {
    let typed_data = mail();
    let key = cow_key();
    let config = SignerConfig::default();
    let signature = sign_typed_data(&typed_data, &key, &config).unwrap();

    let mut other_chain = typed_data.clone();
    other_chain.domain.chain_id = Some(U256::from(5u64));

    let mut other_contract = typed_data.clone();
    other_contract.domain.verifying_contract = Some(key.address());

    assert!(!verify_typed_data(&other_chain, &signature, &key.address(), &config).unwrap());
    // The declared EIP712Domain still lists the same fields, so both stay valid documents
    assert!(!verify_typed_data(&other_contract, &signature, &key.address(), &config).unwrap());
}

#[test]
fn test_high_s_policy() {
    let typed_data = mail();
    let key = cow_key();
    let digest = hash_typed_data(&typed_data).unwrap();
    let signature = sign_typed_data(&typed_data, &key, &SignerConfig::default()).unwrap();
    let malleated = flip_s(&signature);

    assert!(!malleated.is_low_s());
    assert_eq!(recover_address(&digest, &malleated).unwrap(), key.address());

    assert!(!verify_digest(&digest, &malleated, &key.address(), &SignerConfig::strict()).unwrap());
    assert!(verify_digest(&digest, &malleated, &key.address(), &SignerConfig::permissive()).unwrap());
}

#[test]
fn test_v_forms_accepted() {
    let typed_data = mail();
    let key = cow_key();
    let config = SignerConfig::default();
    let mut signature = sign_typed_data(&typed_data, &key, &config).unwrap();

    signature.v -= 27;
    assert!(verify_typed_data(&typed_data, &signature, &key.address(), &config).unwrap());

    signature.v = 35;
    assert!(matches!(
        verify_typed_data(&typed_data, &signature, &key.address(), &config),
        Err(TypedSignError::SignatureFormat(_))
    ));
}

#[test]
fn test_signature_hex_round_trip_through_json() {
    let signature = sign_typed_data(&mail(), &cow_key(), &SignerConfig::default()).unwrap();
    let encoded = serde_json::to_string(&signature).unwrap();
    let decoded: Signature = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, signature);
}

#[test]
fn test_address_errors() {
    let mut bad_length = mail();
    bad_length.message["to"]["wallet"] = json!("0xbBbB");

    let mut bad_checksum = mail();
    bad_checksum.message["to"]["wallet"] = json!("0xBbBbBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB");

    let mut lowercase = mail();
    lowercase.message["to"]["wallet"] = json!("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");

    assert!(matches!(
        hash_typed_data(&bad_length),
        Err(TypedSignError::TypeMismatch { .. })
    ));
    assert!(matches!(
        hash_typed_data(&bad_checksum),
        Err(TypedSignError::TypeMismatch { .. })
    ));
    assert_eq!(
        hash_typed_data(&lowercase).unwrap(),
        hash_typed_data(&mail()).unwrap()
    );
}

#[test]
fn test_to_json_round_trip() {
    let typed_data = mail();
    let reparsed = TypedData::from_json(&typed_data.to_json().unwrap()).unwrap();
    assert_eq!(
        hash_typed_data(&reparsed).unwrap(),
        hash_typed_data(&typed_data).unwrap()
    );
}
