//! # ALFA Media Vault
//!
//! Passcode-gated encrypted media vault.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    ALFA MEDIA VAULT                      │
//! │  ┌───────────────────────────────────────────────────┐  │
//! │  │        MEDIA VAULT API  (hex code_hash / req)      │  │
//! │  └─────────────────────────┬─────────────────────────┘  │
//! │                            │                             │
//! │  ┌─────────────────────────┴─────────────────────────┐  │
//! │  │                  VAULT SERVICE                     │  │
//! │  └──────┬──────────────────┬──────────────────┬──────┘  │
//! │         │                  │                  │          │
//! │  ┌──────┴──────┐  ┌────────┴──────┐  ┌────────┴───────┐  │
//! │  │  PASSCODE   │  │  OBJECT STORE │  │  MEDIA INDEX   │  │
//! │  │  GATE       │  │  *.enc blobs  │  │  SQLite + tags │  │
//! │  └──────┬──────┘  └────────┬──────┘  └────────────────┘  │
//! │         └──────────┬───────┘                             │
//! │             ┌──────┴──────┐                              │
//! │             │ AES-256-GCM │                              │
//! │             └─────────────┘                              │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Model
//!
//! - Every media file sealed with AES-256-GCM under a fresh 96-bit nonce
//! - The key is supplied per request and never written to disk
//! - A key check record proves a candidate key without storing it
//! - Authentication failures are indistinguishable to the caller

pub mod api;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gate;
pub mod index;
pub mod mime;
pub mod secure_fs;
pub mod store;
pub mod vault;

pub use api::{ApiError, ApiResult, MediaVaultApi};
pub use config::VaultConfig;
pub use crypto::{AuthenticationFailure, SealedData, VaultKey};
pub use error::{ErrorCode, VaultError, VaultResult};
pub use gate::{GateState, PasscodeGate};
pub use index::{MediaIndex, MediaRecord, SearchPage, PAGE_SIZE};
pub use store::{ObjectStore, StoredBlob};
pub use vault::{MediaContent, MediaDetails, NewUpload, VaultService};

/// ALFA Media Vault version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// ALFA Media Vault signature
pub const SIGNATURE: &str = "ALFA_MEDIA_VAULT_v1";
