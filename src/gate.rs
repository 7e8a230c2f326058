//! ALFA Media Vault - Passcode Gate
//!
//! The vault key is never stored. Registration seals a fixed marker under
//! the key; verification succeeds only if that marker opens again.

use std::io;
use std::path::Path;

use crate::crypto::{open_sealed, seal, SealedData, VaultKey};
use crate::error::{VaultError, VaultResult};
use crate::secure_fs::SecureFs;

/// Plaintext sealed into the key check record
pub const KEY_CHECK_PLAINTEXT: &[u8] = b"VALID_KEY";

/// Registration state, derived from the presence of the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Unregistered,
    Registered,
}

/// Passcode Gate
#[derive(Debug, Clone)]
pub struct PasscodeGate {
    fs: SecureFs,
    record: String,
}

impl PasscodeGate {
    /// Gate over `fs`, using `record` as the key check file name
    pub fn new(fs: SecureFs, record: impl Into<String>) -> Self {
        Self {
            fs,
            record: record.into(),
        }
    }

    /// Gate over the record file at `path`. Stale temp files next to it are swept.
    pub fn at(path: &Path) -> VaultResult<Self> {
        let (Some(dir), Some(name)) = (path.parent(), path.file_name().and_then(|n| n.to_str()))
        else {
            return Err(VaultError::ConfigError(format!(
                "invalid key check path: {}",
                path.display()
            )));
        };

        let fs = SecureFs::new(dir);
        fs.sweep_temp();
        Ok(Self::new(fs, name))
    }

    /// Current state
    pub fn state(&self) -> GateState {
        if self.fs.exists(&self.record) {
            GateState::Registered
        } else {
            GateState::Unregistered
        }
    }

    pub fn is_registered(&self) -> bool {
        self.state() == GateState::Registered
    }

    /// Register the vault key. Irreversible.
    ///
    /// Once registered every further call is `AlreadyRegistered`, whatever
    /// the candidate looks like.
    pub fn register(&self, candidate: &[u8]) -> VaultResult<()> {
        if self.is_registered() {
            return Err(VaultError::AlreadyRegistered);
        }

        let key = VaultKey::from_slice(candidate)?;

        let sealed = seal(&key, KEY_CHECK_PLAINTEXT)?;

        // Losing a registration race lands here too
        if !self.fs.write_new(&self.record, &sealed.to_record_bytes())? {
            return Err(VaultError::AlreadyRegistered);
        }

        log::info!("Passcode registered");
        Ok(())
    }

    /// Verify a candidate key against the record.
    ///
    /// Returns the key for use in the rest of the request.
    pub fn verify(&self, candidate: &[u8]) -> VaultResult<VaultKey> {
        let data = match self.fs.read_file(&self.record) {
            Ok(data) => data,
            Err(VaultError::IoError(e)) if e.kind() == io::ErrorKind::NotFound => {
                return Err(VaultError::NotRegistered);
            }
            Err(e) => return Err(e),
        };

        let key = VaultKey::from_slice(candidate)?;

        let opened = SealedData::from_record_bytes(&data)
            .and_then(|sealed| open_sealed(&key, &sealed));

        match opened {
            Ok(plaintext) if plaintext == KEY_CHECK_PLAINTEXT => Ok(key),
            _ => {
                log::warn!("Passcode verification failed");
                Err(VaultError::InvalidPasscode)
            }
        }
    }
}
