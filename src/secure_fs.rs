//! ALFA Media Vault - Secure Filesystem Operations
//!
//! Create-once writes for encrypted files under a single root directory.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use uuid::Uuid;

use crate::error::{VaultError, VaultResult};

/// Secure Filesystem Handler
#[derive(Debug, Clone)]
pub struct SecureFs {
    /// Root directory
    root: PathBuf,
}

impl SecureFs {
    /// Create new SecureFs with root directory
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get full path for a relative file.
    ///
    /// Only plain relative paths are accepted; anything with a root, a
    /// prefix or `..` resolves to `None`.
    pub fn full_path(&self, relative: &str) -> Option<PathBuf> {
        let rel = Path::new(relative);
        if relative.is_empty() || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            return None;
        }
        Some(self.root.join(rel))
    }

    fn resolve(&self, relative: &str) -> VaultResult<PathBuf> {
        self.full_path(relative).ok_or_else(|| {
            VaultError::IoError(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("rejected path: {}", relative),
            ))
        })
    }

    /// Write a fully synced temp file next to `path` and return its name
    fn write_temp(path: &Path, data: &[u8]) -> VaultResult<PathBuf> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Unique per writer so concurrent publishers never share a temp file
        let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;

        if let Err(e) = file.write_all(data).and_then(|_| file.sync_all()) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        Ok(temp_path)
    }

    /// Publish a file exactly once.
    ///
    /// Returns `Ok(false)` without touching the target if it already exists.
    /// Readers never observe a partially written file, except on filesystems
    /// without hard links where the exclusive-create fallback is used.
    pub fn write_new(&self, relative_path: &str, data: &[u8]) -> VaultResult<bool> {
        let path = self.resolve(relative_path)?;
        let temp_path = Self::write_temp(&path, data)?;

        // hard_link refuses to replace an existing target
        let linked = fs::hard_link(&temp_path, &path);
        let _ = fs::remove_file(&temp_path);

        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            // exFAT, FAT and some network mounts
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::Unsupported | io::ErrorKind::PermissionDenied
                ) =>
            {
                log::debug!("No hard links under {}: {}", self.root.display(), e);
                Self::write_exclusive(&path, data)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create `path` exclusively and write it in place
    fn write_exclusive(path: &Path, data: &[u8]) -> VaultResult<bool> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = file.write_all(data).and_then(|_| file.sync_all()) {
            let _ = fs::remove_file(path);
            return Err(e.into());
        }

        Ok(true)
    }

    /// Remove temp files left in the root by an interrupted write.
    ///
    /// Returns how many were removed.
    pub fn sweep_temp(&self) -> usize {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return 0;
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_temp = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.ends_with(".tmp"));
            if is_temp && path.is_file() && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }

        if removed > 0 {
            log::info!("Removed {} stale temp file(s) from {}", removed, self.root.display());
        }
        removed
    }

    /// Read encrypted file
    pub fn read_file(&self, relative_path: &str) -> VaultResult<Vec<u8>> {
        let path = self.resolve(relative_path)?;
        Ok(fs::read(&path)?)
    }

    /// Delete file, ignoring every error.
    ///
    /// Returns whether a file was actually removed.
    pub fn remove_quiet(&self, relative_path: &str) -> bool {
        let Some(path) = self.full_path(relative_path) else {
            log::debug!("Refusing to remove rejected path {:?}", relative_path);
            return false;
        };

        match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                log::debug!("Ignoring removal error for {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Check if file exists
    pub fn exists(&self, relative_path: &str) -> bool {
        self.full_path(relative_path)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    /// List file names in a directory (temp files excluded)
    pub fn list_dir(&self, relative_path: &str) -> VaultResult<Vec<String>> {
        let path = if relative_path.is_empty() {
            self.root.clone()
        } else {
            self.resolve(relative_path)?
        };
        let mut files = Vec::new();

        if path.exists() {
            for entry in fs::read_dir(&path)? {
                let entry = entry?;
                if let Some(name) = entry.file_name().to_str() {
                    if !name.ends_with(".tmp") {
                        files.push(name.to_string());
                    }
                }
            }
        }

        files.sort();
        Ok(files)
    }
}
