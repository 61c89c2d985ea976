//! EIP-712 Signing
//!
//! secp256k1 ECDSA signing, public-key recovery and address verification.

use super::hasher::typed_data_pre_image;
use super::types::*;
use crate::config::{LowSPolicy, SignerConfig};
use crate::error::{TypedSignError, TypedSignResult};
use crate::log_debug;
use crate::utils::crypto::{keccak256, strip_hex_prefix, to_checksum_address};
use ethers_core::types::Address;
use rand::RngCore;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use std::fmt;
use zeroize::Zeroizing;

/// A secp256k1 private key with its derived address.
///
/// The scalar is wiped on drop and never printed.
#[derive(Clone)]
pub struct SigningKey {
    secret: Zeroizing<[u8; 32]>,
    address: Address,
}

impl SigningKey {
    /// Create from a 32-byte big-endian scalar in `[1, n-1]`
    pub fn from_bytes(bytes: &[u8]) -> TypedSignResult<Self> {
        if bytes.len() != 32 {
            return Err(TypedSignError::signing(format!(
                "invalid private key length: expected 32, got {}",
                bytes.len()
            )));
        }

        let secret_key = SecretKey::from_slice(bytes)
            .map_err(|e| TypedSignError::signing(format!("invalid private key: {}", e)))?;

        let secp = Secp256k1::signing_only();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);

        let mut secret = Zeroizing::new([0u8; 32]);
        secret.copy_from_slice(bytes);

        Ok(Self {
            secret,
            address: public_key_to_address(&public_key),
        })
    }

    /// Parse a hex private key, `0x` prefix optional
    pub fn from_hex(key_hex: &str) -> TypedSignResult<Self> {
        let bytes = Zeroizing::new(
            hex::decode(strip_hex_prefix(key_hex.trim()))
                .map_err(|e| TypedSignError::signing(format!("invalid private key hex: {}", e)))?,
        );
        Self::from_bytes(&bytes)
    }

    /// Generate a fresh key from the OS RNG
    pub fn random() -> Self {
        let mut rng = rand::rngs::OsRng;
        loop {
            let mut candidate = Zeroizing::new([0u8; 32]);
            rng.fill_bytes(&mut candidate[..]);
            // Out-of-range scalars occur with probability ~2^-128
            if let Ok(key) = Self::from_bytes(&candidate[..]) {
                return key;
            }
        }
    }

    /// The Ethereum address of this key
    pub fn address(&self) -> Address {
        self.address
    }

    /// EIP-55 form of [`SigningKey::address`]
    pub fn checksum_address(&self) -> String {
        to_checksum_address(self.address.as_bytes())
    }

    fn secret_key(&self) -> TypedSignResult<SecretKey> {
        SecretKey::from_slice(&self.secret[..])
            .map_err(|e| TypedSignError::signing(e.to_string()))
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("address", &self.checksum_address())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Sign a 32-byte digest.
///
/// Nonces are RFC 6979 deterministic and `s` is always in the lower half of
/// the curve order. `v` is encoded according to `config.v_format`.
pub fn sign_digest(
    digest: &[u8; 32],
    key: &SigningKey,
    config: &SignerConfig,
) -> TypedSignResult<Signature> {
    let secp = Secp256k1::signing_only();
    let secret_key = key.secret_key()?;
    let message = Message::from_digest(*digest);

    let (recovery_id, compact) = secp
        .sign_ecdsa_recoverable(&message, &secret_key)
        .serialize_compact();

    let recovery_id = match recovery_id.to_i32() {
        0 => 0u8,
        1 => 1u8,
        other => {
            return Err(TypedSignError::signing(format!(
                "recovery id {} cannot be expressed as v",
                other
            )))
        }
    };

    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&compact[0..32]);
    s.copy_from_slice(&compact[32..64]);

    let signature = Signature::new(r, s, config.v_format.encode(recovery_id));

    log_debug!(
        "signer",
        "signed digest",
        digest = hex::encode(digest),
        signer = key.checksum_address(),
        v = signature.v
    );

    Ok(signature)
}

/// Recover the signer's address from a signature.
///
/// Fails when the signature is malformed or no public key corresponds to it.
pub fn recover_address(digest: &[u8; 32], signature: &Signature) -> TypedSignResult<Address> {
    try_recover(digest, signature)?.ok_or_else(|| {
        TypedSignError::signature_format("no public key can be recovered from this signature")
    })
}

/// `Ok(None)` when the signature is well-formed but recovers no key
fn try_recover(digest: &[u8; 32], signature: &Signature) -> TypedSignResult<Option<Address>> {
    let recovery_id = signature.recovery_id()?;

    if !signature.has_valid_scalars() {
        return Err(TypedSignError::signature_format(
            "r and s must be in [1, n-1]",
        ));
    }

    let recovery_id = RecoveryId::from_i32(i32::from(recovery_id))
        .map_err(|e| TypedSignError::signature_format(e.to_string()))?;

    let mut compact = [0u8; 64];
    compact[0..32].copy_from_slice(&signature.r);
    compact[32..64].copy_from_slice(&signature.s);

    let recoverable = RecoverableSignature::from_compact(&compact, recovery_id)
        .map_err(|e| TypedSignError::signature_format(e.to_string()))?;

    let secp = Secp256k1::verification_only();
    let message = Message::from_digest(*digest);

    match secp.recover_ecdsa(&message, &recoverable) {
        Ok(public_key) => Ok(Some(public_key_to_address(&public_key))),
        Err(e) => {
            log_debug!("signer", "public key recovery failed", reason = e);
            Ok(None)
        }
    }
}

/// Verify a signature against a digest and expected address.
///
/// A well-formed signature by another key, or a high-s signature under
/// [`LowSPolicy::Require`], yields `Ok(false)`. Only malformed input is an error.
pub fn verify_digest(
    digest: &[u8; 32],
    signature: &Signature,
    expected: &Address,
    config: &SignerConfig,
) -> TypedSignResult<bool> {
    signature.recovery_id()?;

    if config.low_s == LowSPolicy::Require && signature.has_valid_scalars() && !signature.is_low_s() {
        log_debug!(
            "signer",
            "rejecting high-s signature",
            signature = signature.to_hex()
        );
        return Ok(false);
    }

    let valid = match try_recover(digest, signature)? {
        Some(recovered) => {
            log_debug!(
                "signer",
                "recovered signer",
                recovered = to_checksum_address(recovered.as_bytes()),
                expected = to_checksum_address(expected.as_bytes())
            );
            recovered == *expected
        }
        None => false,
    };

    Ok(valid)
}

/// Like [`verify_digest`], with the expected address given as hex.
///
/// Comparison is case-insensitive; no checksum is required.
pub fn verify_address_str(
    digest: &[u8; 32],
    signature: &Signature,
    expected_address: &str,
    config: &SignerConfig,
) -> TypedSignResult<bool> {
    let expected = parse_expected_address(expected_address)?;
    verify_digest(digest, signature, &expected, config)
}

fn parse_expected_address(address: &str) -> TypedSignResult<Address> {
    let digits = strip_hex_prefix(address.trim());
    if digits.len() != 40 {
        return Err(TypedSignError::mismatch(
            "address",
            format!("expected 40 hex digits, got {}", digits.len()),
        ));
    }
    let bytes = hex::decode(digits)
        .map_err(|e| TypedSignError::mismatch("address", format!("invalid hex: {}", e)))?;
    Ok(Address::from_slice(&bytes))
}

/// Sign EIP-712 typed data
pub fn sign_typed_data(
    typed_data: &TypedData,
    key: &SigningKey,
    config: &SignerConfig,
) -> TypedSignResult<Signature> {
    let pre_image = typed_data_pre_image(typed_data)?;
    sign_digest(&pre_image.digest, key, config)
}

/// Verify an EIP-712 signature
pub fn verify_typed_data(
    typed_data: &TypedData,
    signature: &Signature,
    expected: &Address,
    config: &SignerConfig,
) -> TypedSignResult<bool> {
    let pre_image = typed_data_pre_image(typed_data)?;
    verify_digest(&pre_image.digest, signature, expected, config)
}

/// Convert a secp256k1 public key to an Ethereum address
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    // Uncompressed key is 65 bytes starting with 0x04
    let pubkey_bytes = public_key.serialize_uncompressed();
    let hash = keccak256(&pubkey_bytes[1..]);
    Address::from_slice(&hash[12..])
}
