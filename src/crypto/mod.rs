//! Cryptographic core of the vault.
//!
//! Key derivation, authenticated encryption, vault metadata persistence
//! and the session-key orchestrator.

pub mod aead;
pub mod kdf;
pub mod meta;
pub mod session;

pub use aead::{decrypt, encrypt, generate_salt, random_bytes};
pub use kdf::{derive_key, KdfParams};
pub use meta::VaultMetadata;
pub use session::CryptoHandler;

/// Length of the salt (16 bytes).
pub const SALT_LEN: usize = 16;
/// Length of the nonce (24 bytes for XChaCha20-Poly1305).
pub const NONCE_LEN: usize = 24;
/// Length of the encryption key (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;
/// Poly1305 authentication tag length.
pub const TAG_LEN: usize = 16;
