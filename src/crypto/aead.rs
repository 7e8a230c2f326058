//! ALFA Media Vault - AEAD Encryption
//!
//! AES-256-GCM with a fresh 96-bit nonce per seal and a detached 128-bit tag.
//!
//! On-disk layouts built from a [`SealedData`]:
//!
//! ```text
//! KeyCheckRecord:  [NONCE 12B][CIPHERTEXT][TAG 16B]
//! Media blob:      [CIPHERTEXT][TAG 16B]          (nonce lives in the index)
//! ```

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use thiserror::Error;

use super::keys::{generate_nonce, VaultKey, KEY_LEN, NONCE_LEN, TAG_LEN};
use crate::error::{VaultError, VaultResult};

/// Single opaque failure for every way `open` can go wrong.
///
/// Wrong key, wrong lengths, truncated input and tag mismatch are
/// indistinguishable to the caller.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("authentication failed")]
pub struct AuthenticationFailure;

/// Output of [`seal`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedData {
    /// Ciphertext, same length as the plaintext
    pub ciphertext: Vec<u8>,
    /// Nonce used for this seal
    pub nonce: [u8; NONCE_LEN],
    /// GCM authentication tag
    pub tag: [u8; TAG_LEN],
}

impl SealedData {
    /// Serialize as `nonce || ciphertext || tag`
    pub fn to_record_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_LEN + self.ciphertext.len() + TAG_LEN);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }

    /// Parse `nonce || ciphertext || tag`
    pub fn from_record_bytes(data: &[u8]) -> Result<Self, AuthenticationFailure> {
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(AuthenticationFailure);
        }
        let (nonce, rest) = data.split_at(NONCE_LEN);
        let (ciphertext, tag) = split_blob(rest)?;

        Ok(Self {
            ciphertext: ciphertext.to_vec(),
            nonce: nonce.try_into().map_err(|_| AuthenticationFailure)?,
            tag: tag.try_into().map_err(|_| AuthenticationFailure)?,
        })
    }

    /// Serialize as `ciphertext || tag`, nonce stays with the caller
    pub fn to_blob_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.ciphertext.len() + TAG_LEN);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }
}

/// Split `ciphertext || tag` into its parts
pub fn split_blob(data: &[u8]) -> Result<(&[u8], &[u8]), AuthenticationFailure> {
    if data.len() < TAG_LEN {
        return Err(AuthenticationFailure);
    }
    Ok(data.split_at(data.len() - TAG_LEN))
}

/// Encrypt `plaintext` under `key` with a fresh random nonce
pub fn seal(key: &VaultKey, plaintext: &[u8]) -> VaultResult<SealedData> {
    let cipher = Aes256Gcm::new_from_slice(key.expose())
        .map_err(|_| VaultError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: key.expose().len(),
        })?;

    let nonce_bytes = generate_nonce();
    let nonce = Nonce::from_slice(&nonce_bytes);

    // aes-gcm appends the tag to the ciphertext
    let mut combined = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| VaultError::AuthenticationFailed)?;

    let tag_start = combined.len() - TAG_LEN;
    let tag: [u8; TAG_LEN] = combined[tag_start..]
        .try_into()
        .map_err(|_| VaultError::AuthenticationFailed)?;
    combined.truncate(tag_start);

    Ok(SealedData {
        ciphertext: combined,
        nonce: nonce_bytes,
        tag,
    })
}

/// Verify and decrypt. No plaintext is returned unless the tag verifies.
pub fn open(
    key: &[u8],
    nonce: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>, AuthenticationFailure> {
    if key.len() != KEY_LEN || nonce.len() != NONCE_LEN || tag.len() != TAG_LEN {
        return Err(AuthenticationFailure);
    }

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| AuthenticationFailure)?;

    let mut combined = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);

    cipher
        .decrypt(Nonce::from_slice(nonce), combined.as_slice())
        .map_err(|_| AuthenticationFailure)
}

/// Open a [`SealedData`] with a typed key
pub fn open_sealed(key: &VaultKey, sealed: &SealedData) -> Result<Vec<u8>, AuthenticationFailure> {
    open(key.expose(), &sealed.nonce, &sealed.ciphertext, &sealed.tag)
}
