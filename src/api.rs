//! ALFA Media Vault - Request API
//!
//! The operations a transport calls, one per request. Candidate keys arrive
//! hex-encoded (`code_hash` / `x-passcode`). Every result is either a
//! serializable response or an [`ApiError`] carrying only a public code.
//!
//! Guarded operations re-verify the candidate key on every call. Whatever
//! went wrong during that check, the caller sees `invalid_passcode`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::config::VaultConfig;
use crate::crypto::VaultKey;
use crate::error::{ErrorCode, VaultError, VaultResult};
use crate::index::SearchPage;
use crate::vault::{MediaDetails, NewUpload, VaultService};

/// Error body returned to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ErrorCode,
}

impl From<VaultError> for ApiError {
    fn from(e: VaultError) -> Self {
        let error = e.code();
        if error == ErrorCode::StorageFailure {
            // Detail stays in the log, never in the response
            log::error!("Storage failure: {}", e);
        }
        Self { error }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.error)
    }
}

impl std::error::Error for ApiError {}

/// Result type for request operations
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub registered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub is_registered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    pub media_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub mimetype: String,
    pub bytes: Vec<u8>,
}

/// ALFA Media Vault API
///
/// # Example
///
/// ```rust,ignore
/// use alfa_media_vault::{MediaVaultApi, NewUpload, VaultConfig, VaultKey};
///
/// let api = MediaVaultApi::open(&VaultConfig::at("./vault"))?;
/// let code_hash = hex::encode(VaultKey::from_passcode("1234").expose());
///
/// api.register_passcode(&code_hash)?;
/// let media = api.ingest_media(&code_hash, &NewUpload { .. })?;
/// let file = api.fetch_media(&code_hash, media.media_id)?;
/// ```
#[derive(Clone)]
pub struct MediaVaultApi {
    vault: Arc<VaultService>,
}

impl MediaVaultApi {
    /// Wrap a shared service
    pub fn new(vault: Arc<VaultService>) -> Self {
        Self { vault }
    }

    /// Open the vault described by `config`
    pub fn open(config: &VaultConfig) -> VaultResult<Self> {
        Ok(Self::new(Arc::new(VaultService::open(config)?)))
    }

    /// Underlying service
    pub fn service(&self) -> &Arc<VaultService> {
        &self.vault
    }

    // ═══════════════════════════════════════════════════════════════════════
    // PASSCODE
    // ═══════════════════════════════════════════════════════════════════════

    pub fn register_passcode(&self, code_hash: &str) -> ApiResult<RegisterResponse> {
        let candidate = decode_candidate(code_hash);
        self.vault.register_passcode(&candidate)?;
        Ok(RegisterResponse { registered: true })
    }

    pub fn status(&self) -> StatusResponse {
        StatusResponse {
            is_registered: self.vault.is_registered(),
        }
    }

    pub fn verify_passcode(&self, code_hash: &str) -> ApiResult<OkResponse> {
        let candidate = decode_candidate(code_hash);
        self.vault.verify_passcode(&candidate)?;
        Ok(OkResponse { ok: true })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // GUARDED MEDIA OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn ingest_media(&self, code_hash: &str, upload: &NewUpload) -> ApiResult<IngestResponse> {
        let key = self.authorize(code_hash)?;
        let media_id = self.vault.ingest(upload, &key)?;
        Ok(IngestResponse { media_id })
    }

    pub fn fetch_media(&self, code_hash: &str, media_id: i64) -> ApiResult<FetchResponse> {
        let key = self.authorize(code_hash)?;
        let content = self.vault.retrieve(media_id, &key)?;
        Ok(FetchResponse {
            mimetype: content.mimetype,
            bytes: content.bytes,
        })
    }

    pub fn describe_media(&self, code_hash: &str, media_id: i64) -> ApiResult<MediaDetails> {
        self.authorize(code_hash)?;
        Ok(self.vault.describe(media_id)?)
    }

    pub fn search_media(&self, code_hash: &str, query: &str, page: i64) -> ApiResult<SearchPage> {
        self.authorize(code_hash)?;
        Ok(self.vault.search(query, page)?)
    }

    pub fn delete_media(&self, code_hash: &str, media_id: i64) -> ApiResult<OkResponse> {
        self.authorize(code_hash)?;
        self.vault.discard(media_id)?;
        Ok(OkResponse { ok: true })
    }

    /// Verify the request's candidate key. Every failure looks the same.
    fn authorize(&self, code_hash: &str) -> ApiResult<VaultKey> {
        let candidate = decode_candidate(code_hash);
        self.vault.verify_passcode(&candidate).map_err(|e| {
            if e.is_auth_failure() {
                ApiError {
                    error: ErrorCode::InvalidPasscode,
                }
            } else {
                ApiError::from(e)
            }
        })
    }
}

/// Hex-decode a candidate; undecodable input becomes an empty (wrong-length) key
fn decode_candidate(code_hash: &str) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(hex::decode(code_hash.trim()).unwrap_or_default())
}
