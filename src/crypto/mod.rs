//! ALFA Media Vault - Cryptographic Core
//!
//! AES-256-GCM sealing and the key wrapper it runs on.

pub mod keys;
pub mod aead;

pub use keys::*;
pub use aead::*;
