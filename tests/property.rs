use ethers_core::types::{Address, U256};
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use vault_signer::config::SignerConfig;
use vault_signer::eip712::encoder::{parse_address_str, parse_uint};
use vault_signer::eip712::{hash_typed_data, verify_digest, SigningKey, TypedData};
use vault_signer::vault::{sign_message, signing_hash, vault_domain, verify_message};
use vault_signer::{keccak256, to_checksum_address, Transfer};

fn any_signing_key() -> impl Strategy<Value = SigningKey> {
    prop::array::uniform32(any::<u8>())
        .prop_filter_map("valid secp256k1 scalar", |bytes| SigningKey::from_bytes(&bytes).ok())
}

fn any_address() -> impl Strategy<Value = Address> {
    prop::array::uniform20(any::<u8>()).prop_map(Address::from)
}

fn any_transfer() -> impl Strategy<Value = Transfer> {
    (any_address(), prop::array::uniform32(any::<u8>()), any::<u64>()).prop_map(
        |(to, amount, nonce)| Transfer::new(to, U256::from_big_endian(&amount), nonce),
    )
}

fn vault_address() -> Address {
    Address::from_slice(&hex::decode("a16e02e87b7454126e5e10d957a927a7f5b5d2be").unwrap())
}

fn transfer_document(entries: &[(&str, Value)]) -> String {
    let mut message = Map::new();
    for (key, value) in entries {
        message.insert(key.to_string(), value.clone());
    }
    json!({
        "types": {
            "TRANSFER": [
                {"name": "to", "type": "address"},
                {"name": "amount", "type": "uint256"},
                {"name": "nonce", "type": "uint256"}
            ]
        },
        "primaryType": "TRANSFER",
        "domain": {
            "name": "ManekiVault",
            "version": "1.0.0",
            "chainId": 31337,
            "verifyingContract": "0xa16e02e87b7454126e5e10d957a927a7f5b5d2be"
        },
        "message": Value::Object(message),
    })
    .to_string()
}

proptest! {
    #[test]
    fn checksum_addresses_roundtrip(bytes in prop::array::uniform20(any::<u8>())) {
        let checksummed = to_checksum_address(&bytes);
        prop_assert!(checksummed.starts_with("0x"));

        let lower_expected = hex::encode(bytes);
        let lower_tail = checksummed.trim_start_matches("0x").to_ascii_lowercase();
        prop_assert_eq!(lower_tail.as_str(), lower_expected.as_str());

        let hash = keccak256(lower_expected.as_bytes());
        let mut expected = String::from("0x");
        for (i, ch) in lower_expected.chars().enumerate() {
            let byte = hash[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if ch.is_ascii_digit() || nibble < 8 {
                expected.push(ch);
            } else {
                expected.push(ch.to_ascii_uppercase());
            }
        }
        prop_assert_eq!(&checksummed, &expected);

        let parsed = parse_address_str(&checksummed).unwrap();
        prop_assert_eq!(parsed.as_bytes(), &bytes[..]);
        prop_assert_eq!(parse_address_str(&lower_expected).unwrap(), parsed);
    }

    #[test]
    fn uint_width_is_enforced(value in any::<u64>(), bytes in 1usize..=8) {
        let bits = bytes * 8;
        let fits = bits == 64 || value < (1u64 << bits);
        prop_assert_eq!(parse_uint(bits, &json!(value)).is_ok(), fits);
        prop_assert_eq!(parse_uint(bits, &json!(value.to_string())).is_ok(), fits);
    }

    #[test]
    fn digest_is_deterministic(transfer in any_transfer(), chain_id in 1u64..100_000) {
        let domain = vault_domain(chain_id, vault_address());
        prop_assert_eq!(
            signing_hash(&domain, &transfer).unwrap(),
            signing_hash(&domain, &transfer).unwrap()
        );
    }

    #[test]
    fn message_key_order_is_irrelevant(to in any_address(), amount in any::<u64>(), nonce in any::<u64>()) {
        let to = json!(to_checksum_address(to.as_bytes()));
        let forward = transfer_document(&[
            ("to", to.clone()),
            ("amount", json!(amount)),
            ("nonce", json!(nonce)),
        ]);
        let backward = transfer_document(&[
            ("nonce", json!(nonce)),
            ("amount", json!(amount.to_string())),
            ("to", to),
        ]);

        let forward = TypedData::from_json(&forward).unwrap();
        let backward = TypedData::from_json(&backward).unwrap();
        prop_assert_eq!(hash_typed_data(&forward).unwrap(), hash_typed_data(&backward).unwrap());
    }

    #[test]
    fn sign_verify_roundtrip(key in any_signing_key(), transfer in any_transfer()) {
        let config = SignerConfig::default();
        let domain = vault_domain(31337, vault_address());

        let signature = sign_message(&domain, &transfer, &key, &config).unwrap();
        prop_assert!(signature.is_low_s());
        prop_assert!(verify_message(&domain, &transfer, &signature, &key.address(), &config).unwrap());
    }

    #[test]
    fn other_keys_are_rejected(
        key in any_signing_key(),
        other in any_signing_key(),
        digest in prop::array::uniform32(any::<u8>()),
    ) {
        prop_assume!(key.address() != other.address());
        let config = SignerConfig::default();

        let signature = vault_signer::eip712::sign_digest(&digest, &key, &config).unwrap();
        prop_assert!(!verify_digest(&digest, &signature, &other.address(), &config).unwrap());
    }
}
