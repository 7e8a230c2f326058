//! ALFA Media Vault - Encrypted Object Store
//!
//! One blob per media item, `ciphertext || tag`. The nonce is returned to
//! the caller and kept in the index, never in the blob.

use std::path::Path;

use chrono::Utc;
use uuid::Uuid;

use crate::crypto::{open, seal, split_blob, VaultKey, NONCE_LEN};
use crate::error::{VaultError, VaultResult};
use crate::secure_fs::SecureFs;

/// Longest sanitized hint kept in a blob name
const MAX_HINT_LEN: usize = 64;

/// Blob file extension
const BLOB_EXT: &str = "enc";

/// Attempts before giving up on a unique name
const NAME_ATTEMPTS: usize = 3;

/// Where a blob landed and how to open it again
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// File name relative to the blob directory
    pub blob_path: String,
    /// Nonce used to seal this blob
    pub nonce: [u8; NONCE_LEN],
}

/// Encrypted Object Store
#[derive(Debug, Clone)]
pub struct ObjectStore {
    fs: SecureFs,
}

impl ObjectStore {
    /// Store rooted at the blob directory. Stale temp files are swept.
    pub fn new(dir: &Path) -> Self {
        let fs = SecureFs::new(dir);
        fs.sweep_temp();
        Self { fs }
    }

    /// Blob directory
    pub fn dir(&self) -> &Path {
        self.fs.root()
    }

    /// Seal `content` under `key` and write it as a new blob
    pub fn put(&self, id_hint: &str, content: &[u8], key: &VaultKey) -> VaultResult<StoredBlob> {
        let sealed = seal(key, content)?;
        let bytes = sealed.to_blob_bytes();

        for _ in 0..NAME_ATTEMPTS {
            let name = blob_name(id_hint);
            if self.fs.write_new(&name, &bytes)? {
                return Ok(StoredBlob {
                    blob_path: name,
                    nonce: sealed.nonce,
                });
            }
        }

        Err(VaultError::IoError(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "could not allocate a unique blob name",
        )))
    }

    /// Read and open a blob.
    ///
    /// A missing file is an `IoError`; anything wrong with the bytes, the
    /// nonce or the key is `AuthenticationFailed`.
    pub fn get(&self, blob_path: &str, nonce: &[u8], key: &VaultKey) -> VaultResult<Vec<u8>> {
        let data = self.fs.read_file(blob_path)?;
        let (ciphertext, tag) = split_blob(&data)?;
        Ok(open(key.expose(), nonce, ciphertext, tag)?)
    }

    /// Best-effort delete. Never fails; a missing blob is already the goal.
    pub fn remove(&self, blob_path: &str) {
        if self.fs.remove_quiet(blob_path) {
            log::debug!("Removed blob {}", blob_path);
        }
    }

    /// Check if blob exists
    pub fn exists(&self, blob_path: &str) -> bool {
        self.fs.exists(blob_path)
    }

    /// Blob names currently on disk
    pub fn list(&self) -> VaultResult<Vec<String>> {
        self.fs.list_dir("")
    }
}

/// Replace everything outside `[A-Za-z0-9_.-]` with `_`
pub fn sanitize_hint(hint: &str) -> String {
    let cleaned: String = hint
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_HINT_LEN)
        .collect();

    if cleaned.is_empty() {
        "blob".into()
    } else {
        cleaned
    }
}

/// `<unix millis>_<random>_<hint>.enc`
fn blob_name(id_hint: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}.{}",
        millis,
        &random[..8],
        sanitize_hint(id_hint),
        BLOB_EXT
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::TAG_LEN;
    use tempfile::tempdir;

    #[test]
    fn test_put_get_roundtrip() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let key = VaultKey::generate();

        let stored = store.put("holiday.jpg", b"FAKE JPEG DATA", &key).unwrap();
        assert!(stored.blob_path.ends_with("_holiday.jpg.enc"));
        assert!(store.exists(&stored.blob_path));

        let on_disk = std::fs::read(dir.path().join(&stored.blob_path)).unwrap();
        assert_eq!(on_disk.len(), b"FAKE JPEG DATA".len() + TAG_LEN);

        let content = store.get(&stored.blob_path, &stored.nonce, &key).unwrap();
        assert_eq!(content, b"FAKE JPEG DATA");
    }

    #[test]
    fn test_unique_names_and_nonces() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let key = VaultKey::generate();

        let a = store.put("same", b"one", &key).unwrap();
        let b = store.put("same", b"one", &key).unwrap();
        assert_ne!(a.blob_path, b.blob_path);
        assert_ne!(a.nonce, b.nonce);
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn test_wrong_key_or_nonce_fails() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let key = VaultKey::generate();
        let stored = store.put("clip", b"secret", &key).unwrap();

        let other = VaultKey::generate();
        assert!(matches!(
            store.get(&stored.blob_path, &stored.nonce, &other),
            Err(VaultError::AuthenticationFailed)
        ));

        let mut nonce = stored.nonce;
        nonce[0] ^= 1;
        assert!(matches!(
            store.get(&stored.blob_path, &nonce, &key),
            Err(VaultError::AuthenticationFailed)
        ));
        assert!(matches!(
            store.get(&stored.blob_path, &nonce[..4], &key),
            Err(VaultError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_tampered_blob_fails() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let key = VaultKey::generate();
        let stored = store.put("clip", b"secret bytes", &key).unwrap();

        let path = dir.path().join(&stored.blob_path);
        let mut data = std::fs::read(&path).unwrap();
        data[0] ^= 0xFF;
        std::fs::write(&path, &data).unwrap();
        assert!(matches!(
            store.get(&stored.blob_path, &stored.nonce, &key),
            Err(VaultError::AuthenticationFailed)
        ));

        std::fs::write(&path, [0u8; 5]).unwrap();
        assert!(matches!(
            store.get(&stored.blob_path, &stored.nonce, &key),
            Err(VaultError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let key = VaultKey::generate();
        let stored = store.put("x", b"data", &key).unwrap();

        store.remove(&stored.blob_path);
        assert!(!store.exists(&stored.blob_path));
        store.remove(&stored.blob_path);
        store.remove("never-existed.enc");
        store.remove("../escape.enc");

        assert!(matches!(
            store.get(&stored.blob_path, &stored.nonce, &key),
            Err(VaultError::IoError(_))
        ));
    }

    #[test]
    fn test_new_sweeps_interrupted_writes() {
        let dir = tempdir().unwrap();
        let key = VaultKey::generate();
        let stored = ObjectStore::new(dir.path()).put("keep", b"data", &key).unwrap();
        std::fs::write(dir.path().join("123_abcd_clip.0f0f.tmp"), b"partial").unwrap();

        let store = ObjectStore::new(dir.path());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        assert_eq!(store.get(&stored.blob_path, &stored.nonce, &key).unwrap(), b"data");
    }

    #[test]
    fn test_sanitize_hint() {
        assert_eq!(sanitize_hint("my photo (1).jpg"), "my_photo__1_.jpg");
        assert_eq!(sanitize_hint("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_hint("zdjęcie"), "zdj_cie");
        assert_eq!(sanitize_hint(""), "blob");
        assert_eq!(sanitize_hint(&"a".repeat(200)).len(), MAX_HINT_LEN);
    }
}
