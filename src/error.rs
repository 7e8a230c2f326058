//! ALFA Media Vault - Error Types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Vault error types
///
/// The `Display` output keeps internal detail (paths, SQLite messages) for
/// operators. Callers outside the process only ever see [`ErrorCode`].
#[derive(Error, Debug)]
pub enum VaultError {
    // ═══════════════════════════════════════════════════════════════
    // KEY / PASSCODE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Passcode already registered")]
    AlreadyRegistered,

    #[error("No passcode registered")]
    NotRegistered,

    #[error("Invalid passcode")]
    InvalidPasscode,

    // ═══════════════════════════════════════════════════════════════
    // CRYPTO ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Decryption failed")]
    DecryptFailed,

    // ═══════════════════════════════════════════════════════════════
    // MEDIA ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Media not found: {0}")]
    MediaNotFound(i64),

    // ═══════════════════════════════════════════════════════════════
    // STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Public error taxonomy handed to request callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidKeyLength,
    AlreadyRegistered,
    NotRegistered,
    InvalidPasscode,
    MissingField,
    NotFound,
    DecryptFailed,
    StorageFailure,
}

impl VaultError {
    /// Public code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            VaultError::InvalidKeyLength { .. } => ErrorCode::InvalidKeyLength,
            VaultError::AlreadyRegistered => ErrorCode::AlreadyRegistered,
            VaultError::NotRegistered => ErrorCode::NotRegistered,
            // A bare cipher failure that escaped the gate is still an auth failure
            VaultError::InvalidPasscode | VaultError::AuthenticationFailed => {
                ErrorCode::InvalidPasscode
            }
            VaultError::DecryptFailed => ErrorCode::DecryptFailed,
            VaultError::MissingField(_) => ErrorCode::MissingField,
            VaultError::MediaNotFound(_) => ErrorCode::NotFound,
            VaultError::IoError(_)
            | VaultError::DatabaseError(_)
            | VaultError::ConfigError(_)
            | VaultError::SerializationError(_) => ErrorCode::StorageFailure,
        }
    }

    /// Check if this error comes from authenticating a candidate key
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            VaultError::InvalidKeyLength { .. }
                | VaultError::NotRegistered
                | VaultError::InvalidPasscode
                | VaultError::AuthenticationFailed
        )
    }

    /// Check if this error is an opaque storage failure
    pub fn is_storage_failure(&self) -> bool {
        self.code() == ErrorCode::StorageFailure
    }
}

impl From<rusqlite::Error> for VaultError {
    fn from(e: rusqlite::Error) -> Self {
        VaultError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::SerializationError(e.to_string())
    }
}

impl From<crate::crypto::AuthenticationFailure> for VaultError {
    fn from(_: crate::crypto::AuthenticationFailure) -> Self {
        VaultError::AuthenticationFailed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_are_opaque() {
        let io = VaultError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        assert_eq!(io.code(), ErrorCode::StorageFailure);
        assert!(io.is_storage_failure());
        // Detail is kept for the operator
        assert!(io.to_string().contains("disk full"));

        let db = VaultError::DatabaseError("locked".into());
        assert_eq!(db.code(), ErrorCode::StorageFailure);
    }

    #[test]
    fn test_auth_failures_collapse() {
        assert_eq!(VaultError::AuthenticationFailed.code(), ErrorCode::InvalidPasscode);
        assert_eq!(VaultError::InvalidPasscode.code(), ErrorCode::InvalidPasscode);
        assert!(VaultError::NotRegistered.is_auth_failure());
        assert!(!VaultError::DecryptFailed.is_auth_failure());
    }

    #[test]
    fn test_error_code_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorCode::InvalidPasscode).unwrap();
        assert_eq!(json, "\"invalid_passcode\"");
        let json = serde_json::to_string(&ErrorCode::StorageFailure).unwrap();
        assert_eq!(json, "\"storage_failure\"");
    }
}
