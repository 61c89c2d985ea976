//! Unified error types for the typed-data engine
//!
//! Every failure is structural and detected before any curve operation runs.
//! A well-formed signature that simply does not match is not an error; the
//! verifier reports it as `Ok(false)`.

use serde::{Deserialize, Serialize};

/// Main error type for all hashing, signing and verification operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypedSignError {
    /// Undeclared type reference, cyclic dependency or malformed type name
    #[error("Schema error: {0}")]
    Schema(String),

    /// A declared field is missing from the value tree, or an extra one is present
    #[error("Value error: {0}")]
    Value(String),

    /// A value does not fit the primitive type it was declared with
    #[error("Type mismatch for {type_name}: {reason}")]
    TypeMismatch { type_name: String, reason: String },

    /// The private key is malformed or the curve operation failed
    #[error("Signing error: {0}")]
    Signing(String),

    /// The signature is not a well-formed (r, s, v) triple
    #[error("Malformed signature: {0}")]
    SignatureFormat(String),

    /// A typed-data document could not be parsed
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
}

impl TypedSignError {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn value(msg: impl Into<String>) -> Self {
        Self::Value(msg.into())
    }

    pub fn mismatch(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TypeMismatch {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    pub fn signing(msg: impl Into<String>) -> Self {
        Self::Signing(msg.into())
    }

    pub fn signature_format(msg: impl Into<String>) -> Self {
        Self::SignatureFormat(msg.into())
    }

    /// Stable machine-readable category for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Schema(_) => ErrorCode::SchemaError,
            Self::Value(_) => ErrorCode::ValueError,
            Self::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            Self::Signing(_) => ErrorCode::SigningError,
            Self::SignatureFormat(_) => ErrorCode::SignatureFormat,
            Self::InvalidJson(_) => ErrorCode::JsonError,
        }
    }

    /// Serializable view of this error
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    SchemaError,
    ValueError,
    TypeMismatch,
    SigningError,
    SignatureFormat,
    JsonError,
}

/// Serializable error payload, printed by the CLI in `--json` mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

/// Result type alias for typed-data operations
pub type TypedSignResult<T> = Result<T, TypedSignError>;

impl From<serde_json::Error> for TypedSignError {
    fn from(e: serde_json::Error) -> Self {
        TypedSignError::InvalidJson(e.to_string())
    }
}
