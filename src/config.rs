//! Signer Configuration
//!
//! Signature conventions that depend on the verifying contract rather than on
//! EIP-712 itself:
//! - whether high-s signatures are accepted by the verifier
//! - whether `v` is emitted as 27/28 or as a raw 0/1 recovery id
//!
//! The signer always produces low-s signatures; the policy only affects
//! verification.

use crate::log_warn;

/// Environment variable selecting the low-s policy (`require` or `allow`)
pub const LOW_S_ENV_VAR: &str = "VAULT_SIGNER_LOW_S";

/// Environment variable selecting the `v` format (`27` or `0`)
pub const V_FORMAT_ENV_VAR: &str = "VAULT_SIGNER_V_FORMAT";

/// How the verifier treats signatures whose `s` lies in the upper half of the curve order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LowSPolicy {
    /// High-s signatures verify as `false` (OpenZeppelin `ECDSA.recover` behaviour)
    Require,
    /// Both s forms are accepted (raw `ecrecover` behaviour)
    Allow,
}

/// Encoding of the recovery id in produced signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryFormat {
    /// `v` in {27, 28}
    Electrum,
    /// `v` in {0, 1}
    Raw,
}

impl RecoveryFormat {
    /// Encode a 0/1 recovery id into `v`
    pub fn encode(self, recovery_id: u8) -> u8 {
        match self {
            RecoveryFormat::Electrum => recovery_id + 27,
            RecoveryFormat::Raw => recovery_id,
        }
    }
}

/// Configuration presets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLevel {
    Strict,
    Permissive,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerConfig {
    pub level: ConfigLevel,
    pub low_s: LowSPolicy,
    pub v_format: RecoveryFormat,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self::strict()
    }
}

impl SignerConfig {
    /// Canonical signatures only, `v` in {27, 28}
    pub fn strict() -> Self {
        Self {
            level: ConfigLevel::Strict,
            low_s: LowSPolicy::Require,
            v_format: RecoveryFormat::Electrum,
        }
    }

    /// Accept malleable signatures, `v` in {27, 28}
    pub fn permissive() -> Self {
        Self {
            level: ConfigLevel::Permissive,
            low_s: LowSPolicy::Allow,
            v_format: RecoveryFormat::Electrum,
        }
    }

    pub fn with_low_s(mut self, policy: LowSPolicy) -> Self {
        self.level = ConfigLevel::Custom;
        self.low_s = policy;
        self
    }

    pub fn with_v_format(mut self, format: RecoveryFormat) -> Self {
        self.level = ConfigLevel::Custom;
        self.v_format = format;
        self
    }

    /// Start from [`SignerConfig::strict`] and apply overrides from the environment.
    ///
    /// Unrecognised values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::strict();

        if let Ok(raw) = std::env::var(LOW_S_ENV_VAR) {
            match parse_low_s(&raw) {
                Some(policy) => config = config.with_low_s(policy),
                None => log_warn!("config", "ignoring unrecognised low-s policy", value = raw),
            }
        }

        if let Ok(raw) = std::env::var(V_FORMAT_ENV_VAR) {
            match parse_v_format(&raw) {
                Some(format) => config = config.with_v_format(format),
                None => log_warn!("config", "ignoring unrecognised v format", value = raw),
            }
        }

        config
    }

    /// Validate settings consistency
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.low_s == LowSPolicy::Allow {
            warnings.push(
                "Warning: high-s signatures are accepted; signatures are malleable".to_string(),
            );
        }

        if self.v_format == RecoveryFormat::Raw {
            warnings.push(
                "Warning: v is emitted as 0/1; contracts using ecrecover expect 27/28".to_string(),
            );
        }

        warnings
    }
}

pub fn parse_low_s(raw: &str) -> Option<LowSPolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "require" | "strict" => Some(LowSPolicy::Require),
        "allow" | "permissive" => Some(LowSPolicy::Allow),
        _ => None,
    }
}

pub fn parse_v_format(raw: &str) -> Option<RecoveryFormat> {
    match raw.trim() {
        "27" | "electrum" => Some(RecoveryFormat::Electrum),
        "0" | "raw" => Some(RecoveryFormat::Raw),
        _ => None,
    }
}
