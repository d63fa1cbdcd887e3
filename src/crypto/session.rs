//! Session-key orchestrator: setup, unlock, rotate, lock.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use log::{info, warn};
use zeroize::{Zeroize, Zeroizing};

use super::{aead, derive_key, generate_salt, KdfParams, VaultMetadata, KEY_LEN};
use crate::error::{Result, VaultError};

/// Fixed plaintext whose successful decryption is the sole proof that a
/// candidate password is correct. Never exposed to callers.
const VERIFICATION_TOKEN: &[u8] = b"keyfort-verification-token-v1";

/// Owns the in-memory session key and the vault metadata files.
///
/// The key lives in a single mutex-guarded cell so that unlock, rotate and
/// lock are mutually exclusive by construction; there is exactly one
/// session key per process.
pub struct CryptoHandler {
    data_dir: PathBuf,
    default_kdf: KdfParams,
    key: Mutex<Option<[u8; KEY_LEN]>>,
}

impl Drop for CryptoHandler {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.key.lock() {
            if let Some(mut key) = guard.take() {
                key.zeroize();
            }
        }
    }
}

impl CryptoHandler {
    pub fn new(data_dir: PathBuf) -> Self {
        Self::with_default_kdf(data_dir, KdfParams::default())
    }

    /// Override the KDF parameters used for newly created vaults.
    /// Existing vaults always use the parameters recorded on disk.
    pub fn with_default_kdf(data_dir: PathBuf, default_kdf: KdfParams) -> Self {
        Self {
            data_dir,
            default_kdf,
            key: Mutex::new(None),
        }
    }

    /// True iff both the metadata record and the verification token exist.
    pub fn is_initialized(&self) -> bool {
        let has_meta = VaultMetadata::meta_path(&self.data_dir).exists()
            || self.data_dir.join(super::meta::LEGACY_SALT_FILE).exists();
        has_meta && VaultMetadata::verify_path(&self.data_dir).exists()
    }

    /// First-run setup: fresh salt, default params, encrypted verification
    /// token. I/O failures propagate — a half-written vault must never
    /// silently claim success.
    pub fn setup(&self, password: &str) -> Result<()> {
        if password.is_empty() {
            return Err(VaultError::validation("master password must not be empty"));
        }
        if self.is_initialized() {
            return Err(VaultError::validation("vault is already initialized"));
        }
        let mut guard = self.key.lock().expect("session key mutex poisoned");

        info!("setting up a new vault in {:?}", self.data_dir);
        let salt = generate_salt()?;
        let meta = VaultMetadata {
            salt,
            kdf: self.default_kdf,
        };
        let key = derive_key(password, &salt, meta.kdf)?;

        // Salt first, token second: a crash in between leaves a vault that
        // reads as uninitialized rather than one with an orphaned token.
        meta.save(&self.data_dir)?;
        let token = aead::encrypt(&key, VERIFICATION_TOKEN)?;
        fs::write(VaultMetadata::verify_path(&self.data_dir), token)?;

        *guard = Some(key);
        info!("vault setup complete");
        Ok(())
    }

    /// Attempt to unlock with `password`. Wrong password is `Ok(false)`,
    /// never an error — guessing is a routine caller action. Unlocking an
    /// already-unlocked vault is an idempotent success.
    pub fn unlock(&self, password: &str) -> Result<bool> {
        // The key cell is held from before the token read until the swap,
        // so a rotation cannot slide in between and leave a stale key.
        let mut guard = self.key.lock().expect("session key mutex poisoned");

        let Some(meta) = VaultMetadata::load(&self.data_dir)? else {
            warn!("unlock attempted on an uninitialized vault");
            return Ok(false);
        };

        let verify_path = VaultMetadata::verify_path(&self.data_dir);
        if !verify_path.exists() {
            warn!("verification token missing; vault is not fully initialized");
            return Ok(false);
        }
        let token_blob = fs::read(verify_path)?;

        let candidate = derive_key(password, &meta.salt, meta.kdf)?;
        match aead::decrypt(&candidate, &token_blob) {
            Ok(plaintext) if *plaintext == VERIFICATION_TOKEN => {
                *guard = Some(candidate);
                info!("vault unlocked");
                Ok(true)
            }
            Ok(_) => {
                warn!("verification token decrypted but did not match");
                Ok(false)
            }
            Err(VaultError::Authentication) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Verify the old password and swap the verification token and the
    /// session key to the new one. Does NOT touch entry payloads; the
    /// record store drives the full transactional rotation.
    pub fn rotate(&self, old_password: &str, new_password: &str) -> Result<bool> {
        if new_password.is_empty() {
            return Err(VaultError::validation("new master password must not be empty"));
        }
        let mut guard = self.key.lock().expect("session key mutex poisoned");

        let Some(meta) = VaultMetadata::load(&self.data_dir)? else {
            warn!("rotate attempted on an uninitialized vault");
            return Ok(false);
        };

        let token_blob = fs::read(VaultMetadata::verify_path(&self.data_dir))?;
        let old_key = derive_key(old_password, &meta.salt, meta.kdf)?;
        match aead::decrypt(&old_key, &token_blob) {
            Ok(plaintext) if *plaintext == VERIFICATION_TOKEN => {}
            Ok(_) | Err(VaultError::Authentication) => {
                warn!("old master password rejected during rotation");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        let new_key = derive_key(new_password, &meta.salt, meta.kdf)?;
        let token = aead::encrypt(&new_key, VERIFICATION_TOKEN)?;

        // A legacy salt-only vault gets rewritten in the current layout
        // the first time its password changes.
        meta.save(&self.data_dir)?;
        fs::write(VaultMetadata::verify_path(&self.data_dir), token)?;

        *guard = Some(new_key);
        info!("master key rotated at the crypto layer");
        Ok(true)
    }

    /// Discard the session key. Subsequent encrypt/decrypt calls fail
    /// with [`VaultError::Locked`].
    pub fn lock(&self) {
        let mut guard = self.key.lock().expect("session key mutex poisoned");
        if let Some(mut key) = guard.take() {
            key.zeroize();
        }
        info!("vault locked");
    }

    pub fn is_unlocked(&self) -> bool {
        self.key.lock().expect("session key mutex poisoned").is_some()
    }

    /// Encrypt with the current session key.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let guard = self.key.lock().expect("session key mutex poisoned");
        let key = guard.as_ref().ok_or(VaultError::Locked)?;
        aead::encrypt(key, plaintext)
    }

    /// Decrypt with the current session key.
    pub fn decrypt(&self, blob: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let guard = self.key.lock().expect("session key mutex poisoned");
        let key = guard.as_ref().ok_or(VaultError::Locked)?;
        aead::decrypt(key, blob)
    }

    /// The persisted salt and cost parameters, if the vault exists.
    pub fn metadata(&self) -> Result<Option<VaultMetadata>> {
        VaultMetadata::load(&self.data_dir)
    }
}
