//! ALFA Media Vault - Configuration
//!
//! Where the vault keeps its key check record, blobs and index.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

/// Vault configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Vault root directory
    pub root: PathBuf,
    /// Key check record, relative to root
    pub keycheck_file: String,
    /// Encrypted blob directory, relative to root
    pub blobs_dir: String,
    /// SQLite index, relative to root
    pub database_file: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./vault"),
            keycheck_file: "keycheck.bin".into(),
            blobs_dir: "uploads/encrypted".into(),
            database_file: "database.sqlite".into(),
        }
    }
}

impl VaultConfig {
    /// Default layout rooted at `root`
    pub fn at<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> VaultResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            VaultError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_slice(&data)
            .map_err(|e| VaultError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> VaultResult<()> {
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reject empty names
    pub fn validate(&self) -> VaultResult<()> {
        for (field, value) in [
            ("keycheck_file", &self.keycheck_file),
            ("blobs_dir", &self.blobs_dir),
            ("database_file", &self.database_file),
        ] {
            if value.trim().is_empty() {
                return Err(VaultError::ConfigError(format!("{} must not be empty", field)));
            }
        }
        Ok(())
    }

    pub fn keycheck_path(&self) -> PathBuf {
        self.root.join(&self.keycheck_file)
    }

    pub fn blobs_path(&self) -> PathBuf {
        self.root.join(&self.blobs_dir)
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(&self.database_file)
    }

    /// Create root and blob directories
    pub fn ensure_dirs(&self) -> VaultResult<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.blobs_path())?;
        if let Some(parent) = self.database_path().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}
