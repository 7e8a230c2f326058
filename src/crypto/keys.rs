//! ALFA Media Vault - Key Material
//!
//! The vault key is supplied per request and never written to disk.

use secrecy::{ExposeSecret, Secret};
use sha2::{Digest, Sha256};

use crate::error::{VaultError, VaultResult};

/// Key length for AES-256
pub const KEY_LEN: usize = 32;

/// Nonce length for AES-GCM
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length
pub const TAG_LEN: usize = 16;

/// Secure key wrapper, zeroized on drop
pub struct VaultKey {
    inner: Secret<[u8; KEY_LEN]>,
}

impl VaultKey {
    /// Create a new vault key from bytes
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            inner: Secret::new(bytes),
        }
    }

    /// Build a key from a candidate byte slice
    pub fn from_slice(candidate: &[u8]) -> VaultResult<Self> {
        let bytes: [u8; KEY_LEN] = candidate
            .try_into()
            .map_err(|_| VaultError::InvalidKeyLength {
                expected: KEY_LEN,
                actual: candidate.len(),
            })?;
        Ok(Self::new(bytes))
    }

    /// Map a passcode to a key.
    ///
    /// Plain SHA-256, no stretching. This matches what the browser client
    /// sends as `code_hash` and offers no resistance to guessing short
    /// passcodes.
    pub fn from_passcode(passcode: &str) -> Self {
        let digest = Sha256::digest(passcode.as_bytes());
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&digest);
        Self::new(bytes)
    }

    /// Expose the key bytes (use with caution)
    pub fn expose(&self) -> &[u8; KEY_LEN] {
        self.inner.expose_secret()
    }

    /// Generate a random key
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::new(bytes)
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VaultKey([REDACTED])")
    }
}

/// Generate a random nonce for AES-GCM
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    use rand::RngCore;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

/// Encode a nonce for the index (24 lowercase hex chars)
pub fn nonce_to_hex(nonce: &[u8; NONCE_LEN]) -> String {
    hex::encode(nonce)
}

/// Decode a nonce stored in the index
pub fn nonce_from_hex(encoded: &str) -> Option<[u8; NONCE_LEN]> {
    let bytes = hex::decode(encoded).ok()?;
    bytes.try_into().ok()
}
