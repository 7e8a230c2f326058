//! ALFA Media Vault - Vault Service
//!
//! Orchestrates the passcode gate, the encrypted object store and the media
//! index. Every media operation takes the `VaultKey` that the gate returned
//! for the current request.
//!
//! Write ordering keeps the index from ever pointing at a missing blob:
//!
//! ```text
//! ingest:   blob written  -> row inserted -> tags attached
//! discard:  row deleted   -> blob removed
//! ```

use serde::{Deserialize, Serialize};

use crate::config::VaultConfig;
use crate::crypto::{nonce_from_hex, nonce_to_hex, VaultKey};
use crate::error::{VaultError, VaultResult};
use crate::gate::PasscodeGate;
use crate::index::{MediaIndex, MediaRecord, NewMedia, SearchPage};
use crate::mime;
use crate::store::ObjectStore;

/// An upload as handed over by the transport
#[derive(Debug, Clone, Default)]
pub struct NewUpload {
    pub title: String,
    pub description: String,
    /// Comma-separated tag list
    pub tags: String,
    /// Declared content type; sniffed when empty
    pub mimetype: String,
    /// Original file name, used as the blob name hint
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Decrypted media content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaContent {
    pub mimetype: String,
    pub bytes: Vec<u8>,
}

/// Record plus its tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDetails {
    #[serde(flatten)]
    pub record: MediaRecord,
    pub tags: Vec<String>,
}

/// Vault Service - main entry point
pub struct VaultService {
    gate: PasscodeGate,
    store: ObjectStore,
    index: MediaIndex,
}

impl VaultService {
    /// Assemble a service from its parts
    pub fn new(gate: PasscodeGate, store: ObjectStore, index: MediaIndex) -> Self {
        Self { gate, store, index }
    }

    /// Open (creating directories and schema as needed) the vault described by `config`
    pub fn open(config: &VaultConfig) -> VaultResult<Self> {
        config.validate()?;
        config.ensure_dirs()?;

        let gate = PasscodeGate::at(&config.keycheck_path())?;
        let store = ObjectStore::new(&config.blobs_path());
        let index = MediaIndex::open(&config.database_path())?;

        log::info!("Vault opened at {}", config.root.display());
        Ok(Self::new(gate, store, index))
    }

    pub fn gate(&self) -> &PasscodeGate {
        &self.gate
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn index(&self) -> &MediaIndex {
        &self.index
    }

    // ═══════════════════════════════════════════════════════════════════════
    // PASSCODE
    // ═══════════════════════════════════════════════════════════════════════

    pub fn register_passcode(&self, candidate: &[u8]) -> VaultResult<()> {
        self.gate.register(candidate)
    }

    pub fn is_registered(&self) -> bool {
        self.gate.is_registered()
    }

    /// Verify a candidate key and hand back the key for this request
    pub fn verify_passcode(&self, candidate: &[u8]) -> VaultResult<VaultKey> {
        self.gate.verify(candidate)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // MEDIA OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════

    /// Encrypt and index an upload, returning the new media id
    pub fn ingest(&self, upload: &NewUpload, key: &VaultKey) -> VaultResult<i64> {
        let title = upload.title.trim();
        if title.is_empty() {
            return Err(VaultError::MissingField("title"));
        }
        if upload.bytes.is_empty() {
            return Err(VaultError::MissingField("file"));
        }

        let mimetype = match upload.mimetype.trim() {
            "" => mime::detect(&upload.bytes).to_string(),
            declared => declared.to_string(),
        };

        let stored = self.store.put(&upload.filename, &upload.bytes, key)?;

        let nonce_hex = nonce_to_hex(&stored.nonce);
        let inserted = self.index.insert_with_tags(
            &NewMedia {
                title,
                description: upload.description.trim(),
                blob_path: &stored.blob_path,
                nonce_hex: &nonce_hex,
                mimetype: &mimetype,
            },
            &upload.tags,
        );

        let media_id = match inserted {
            Ok(id) => id,
            Err(e) => {
                // Unreferenced blob is invisible to listing and search; left for cleanup
                log::error!("Index insert failed, orphaned blob {}: {}", stored.blob_path, e);
                return Err(e);
            }
        };

        log::info!(
            "Ingested media {} ({} bytes, {})",
            media_id,
            upload.bytes.len(),
            mimetype
        );
        Ok(media_id)
    }

    /// Decrypt a media item
    pub fn retrieve(&self, media_id: i64, key: &VaultKey) -> VaultResult<MediaContent> {
        let record = self.index.get(media_id)?;

        let nonce = nonce_from_hex(&record.nonce).ok_or_else(|| {
            log::error!("Media {} has a malformed nonce", media_id);
            VaultError::DecryptFailed
        })?;

        // Key already passed the gate: an auth failure here means damaged data
        let bytes = match self.store.get(&record.blob_path, &nonce, key) {
            Ok(bytes) => bytes,
            Err(VaultError::AuthenticationFailed) => {
                log::error!("Decrypt failed for media {}", media_id);
                return Err(VaultError::DecryptFailed);
            }
            Err(e) => return Err(e),
        };

        Ok(MediaContent {
            mimetype: record.mimetype,
            bytes,
        })
    }

    /// Metadata and tags for one item
    pub fn describe(&self, media_id: i64) -> VaultResult<MediaDetails> {
        let record = self.index.get(media_id)?;
        let tags = self.index.tags_for(media_id)?;
        Ok(MediaDetails { record, tags })
    }

    /// Substring search over title, description and tags
    pub fn search(&self, query: &str, page: i64) -> VaultResult<SearchPage> {
        self.index.search(query, page)
    }

    /// Delete a media item: row first, then blob
    pub fn discard(&self, media_id: i64) -> VaultResult<()> {
        let blob_path = self.index.delete(media_id)?;
        self.store.remove(&blob_path);

        log::info!("Discarded media {}", media_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    const KEY: [u8; 32] = [0x42; 32];

    fn vault_in(dir: &std::path::Path) -> VaultService {
        let service = VaultService::open(&VaultConfig::at(dir)).unwrap();
        service.register_passcode(&KEY).unwrap();
        service
    }

    fn upload(title: &str, tags: &str, bytes: &[u8]) -> NewUpload {
        NewUpload {
            title: title.into(),
            tags: tags.into(),
            mimetype: "image/png".into(),
            filename: format!("{}.png", title),
            bytes: bytes.to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn test_open_creates_layout() {
        let dir = tempdir().unwrap();
        let config = VaultConfig::at(dir.path().join("vault"));
        let service = VaultService::open(&config).unwrap();

        assert!(!service.is_registered());
        assert!(config.blobs_path().is_dir());
        assert!(config.database_path().is_file());

        service.register_passcode(&KEY).unwrap();
        assert!(config.keycheck_path().is_file());
    }

    #[test]
    fn test_end_to_end() {
        let dir = tempdir().unwrap();
        let vault = vault_in(dir.path());
        let key = vault.verify_passcode(&KEY).unwrap();

        let id = vault
            .ingest(&upload("x", "demo", b"\x01\x02\x03\x04\x05"), &key)
            .unwrap();

        let content = vault.retrieve(id, &key).unwrap();
        assert_eq!(content.bytes, b"\x01\x02\x03\x04\x05");
        assert_eq!(content.mimetype, "image/png");

        // A different key never yields the plaintext
        let other = VaultKey::new([0x43; 32]);
        assert!(matches!(vault.retrieve(id, &other), Err(VaultError::DecryptFailed)));

        vault.discard(id).unwrap();
        assert!(matches!(vault.retrieve(id, &key), Err(VaultError::MediaNotFound(_))));
        assert!(vault.store().list().unwrap().is_empty());
    }

    #[test]
    fn test_blob_is_encrypted_at_rest() {
        let dir = tempdir().unwrap();
        let vault = vault_in(dir.path());
        let key = vault.verify_passcode(&KEY).unwrap();
        let secret = b"PLAINTEXT MARKER THAT MUST NOT HIT THE DISK";

        let id = vault.ingest(&upload("doc", "", secret), &key).unwrap();
        let record = vault.index().get(id).unwrap();

        let on_disk = std::fs::read(vault.store().dir().join(&record.blob_path)).unwrap();
        assert_eq!(on_disk.len(), secret.len() + 16);
        assert!(!on_disk.windows(secret.len()).any(|w| w == &secret[..]));
        assert_eq!(record.nonce.len(), 24);
    }

    #[test]
    fn test_ingest_requires_title_and_bytes() {
        let dir = tempdir().unwrap();
        let vault = vault_in(dir.path());
        let key = vault.verify_passcode(&KEY).unwrap();

        assert!(matches!(
            vault.ingest(&upload("   ", "", b"data"), &key),
            Err(VaultError::MissingField("title"))
        ));
        assert!(matches!(
            vault.ingest(&upload("t", "", b""), &key),
            Err(VaultError::MissingField("file"))
        ));

        // Nothing written on rejection
        assert_eq!(vault.index().count().unwrap(), 0);
        assert!(vault.store().list().unwrap().is_empty());
    }

    #[test]
    fn test_ingest_sniffs_missing_mimetype() {
        let dir = tempdir().unwrap();
        let vault = vault_in(dir.path());
        let key = vault.verify_passcode(&KEY).unwrap();

        let mut png = upload("img", "", b"\x89PNG\r\n\x1a\nrest-of-image");
        png.mimetype = String::new();
        let id = vault.ingest(&png, &key).unwrap();
        assert_eq!(vault.retrieve(id, &key).unwrap().mimetype, "image/png");

        let mut blob = upload("raw", "", b"?");
        blob.mimetype = " ".into();
        let id = vault.ingest(&blob, &key).unwrap();
        assert_eq!(vault.retrieve(id, &key).unwrap().mimetype, mime::OCTET_STREAM);
    }

    fn break_table(dir: &std::path::Path, table: &str) {
        let side = rusqlite::Connection::open(VaultConfig::at(dir).database_path()).unwrap();
        side.execute_batch(&format!(
            "CREATE TRIGGER reject_{table} BEFORE INSERT ON {table}
             BEGIN SELECT RAISE(ABORT, 'disk glitch'); END;"
        ))
        .unwrap();
    }

    #[test]
    fn test_failed_blob_write_leaves_no_row() {
        let dir = tempdir().unwrap();
        let vault = vault_in(dir.path());
        let key = vault.verify_passcode(&KEY).unwrap();

        let blobs = VaultConfig::at(dir.path()).blobs_path();
        std::fs::remove_dir_all(&blobs).unwrap();
        std::fs::write(&blobs, b"not a directory").unwrap();

        let err = vault.ingest(&upload("x", "t", b"payload"), &key).unwrap_err();
        assert!(err.is_storage_failure());
        assert_eq!(vault.index().count().unwrap(), 0);
        assert_eq!(vault.search("", 1).unwrap().total, 0);
    }

    #[test]
    fn test_failed_insert_leaves_orphan_blob_only() {
        let dir = tempdir().unwrap();
        let vault = vault_in(dir.path());
        let key = vault.verify_passcode(&KEY).unwrap();
        break_table(dir.path(), "media");

        let err = vault.ingest(&upload("x", "", b"payload"), &key).unwrap_err();
        assert!(err.is_storage_failure());
        assert_eq!(vault.index().count().unwrap(), 0);
        assert_eq!(vault.store().list().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_tagging_rolls_back_row() {
        let dir = tempdir().unwrap();
        let vault = vault_in(dir.path());
        let key = vault.verify_passcode(&KEY).unwrap();
        break_table(dir.path(), "tags");

        let err = vault.ingest(&upload("x", "demo", b"payload"), &key).unwrap_err();
        assert!(err.is_storage_failure());
        assert_eq!(vault.index().count().unwrap(), 0);
        assert_eq!(vault.search("", 1).unwrap().total, 0);
        assert_eq!(vault.store().list().unwrap().len(), 1);

        // Untagged uploads still go through
        let id = vault.ingest(&upload("y", "", b"payload"), &key).unwrap();
        assert_eq!(vault.retrieve(id, &key).unwrap().bytes, b"payload");
    }

    #[test]
    fn test_search_newest_first() {
        let dir = tempdir().unwrap();
        let vault = vault_in(dir.path());
        let key = vault.verify_passcode(&KEY).unwrap();

        let tagged = vault.ingest(&upload("first", "cat", b"a"), &key).unwrap();
        let titled = vault.ingest(&upload("my cat", "", b"b"), &key).unwrap();
        vault.ingest(&upload("dog", "dog", b"c"), &key).unwrap();

        let page = vault.search("cat", 1).unwrap();
        let ids: Vec<i64> = page.rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![titled, tagged]);
        assert_eq!(page.total, 2);
    }

    #[test]
    fn test_describe() {
        let dir = tempdir().unwrap();
        let vault = vault_in(dir.path());
        let key = vault.verify_passcode(&KEY).unwrap();

        let id = vault.ingest(&upload("x", "Beach, sun, beach", b"1"), &key).unwrap();
        let details = vault.describe(id).unwrap();
        assert_eq!(details.record.title, "x");
        assert_eq!(details.tags, vec!["beach", "sun"]);
    }

    #[test]
    fn test_retrieve_corrupted_blob() {
        let dir = tempdir().unwrap();
        let vault = vault_in(dir.path());
        let key = vault.verify_passcode(&KEY).unwrap();

        let id = vault.ingest(&upload("x", "", b"12345"), &key).unwrap();
        let record = vault.index().get(id).unwrap();
        let path = vault.store().dir().join(&record.blob_path);

        let mut data = std::fs::read(&path).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0x01;
        std::fs::write(&path, &data).unwrap();

        assert!(matches!(vault.retrieve(id, &key), Err(VaultError::DecryptFailed)));
    }

    #[test]
    fn test_retrieve_missing_blob_is_storage_failure() {
        let dir = tempdir().unwrap();
        let vault = vault_in(dir.path());
        let key = vault.verify_passcode(&KEY).unwrap();

        let id = vault.ingest(&upload("x", "", b"12345"), &key).unwrap();
        let record = vault.index().get(id).unwrap();
        std::fs::remove_file(vault.store().dir().join(&record.blob_path)).unwrap();

        let err = vault.retrieve(id, &key).unwrap_err();
        assert!(err.is_storage_failure());
    }

    #[test]
    fn test_discard_survives_missing_blob() {
        let dir = tempdir().unwrap();
        let vault = vault_in(dir.path());
        let key = vault.verify_passcode(&KEY).unwrap();

        let id = vault.ingest(&upload("x", "t", b"12345"), &key).unwrap();
        let record = vault.index().get(id).unwrap();
        std::fs::remove_file(vault.store().dir().join(&record.blob_path)).unwrap();

        vault.discard(id).unwrap();
        assert!(matches!(vault.discard(id), Err(VaultError::MediaNotFound(_))));
        assert_eq!(vault.search("", 1).unwrap().total, 0);
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempdir().unwrap();
        let id = {
            let vault = vault_in(dir.path());
            let key = vault.verify_passcode(&KEY).unwrap();
            vault.ingest(&upload("kept", "k", b"persist"), &key).unwrap()
        };

        let vault = VaultService::open(&VaultConfig::at(dir.path())).unwrap();
        assert!(vault.is_registered());
        let key = vault.verify_passcode(&KEY).unwrap();
        assert_eq!(vault.retrieve(id, &key).unwrap().bytes, b"persist");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests() {
        let dir = tempdir().unwrap();
        let vault = Arc::new(vault_in(dir.path()));

        let mut handles = Vec::new();
        for i in 0..12u8 {
            let vault = Arc::clone(&vault);
            handles.push(tokio::task::spawn_blocking(move || -> VaultResult<()> {
                let key = vault.verify_passcode(&KEY)?;
                let payload = vec![i; 64];
                let id = vault.ingest(&upload(&format!("item {}", i), "shared, new", &payload), &key)?;
                assert_eq!(vault.retrieve(id, &key)?.bytes, payload);
                Ok(())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let page = vault.search("shared", 1).unwrap();
        assert_eq!(page.total, 12);
        assert_eq!(page.total_pages, 2);
    }
}
