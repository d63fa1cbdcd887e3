//! Persisted vault metadata: salt and KDF cost parameters.

use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::warn;
use serde::{Deserialize, Serialize};

use super::kdf::KdfParams;
use super::SALT_LEN;
use crate::error::{Result, VaultError};

/// File holding the current metadata layout (JSON, salt + params).
pub const META_FILE: &str = "vault.meta";
/// File holding the encrypted verification token.
pub const VERIFY_FILE: &str = "verify.key";
/// Historical layout: raw salt bytes, KDF params implied by legacy defaults.
pub const LEGACY_SALT_FILE: &str = "vault.salt";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MetaOnDisk {
    salt_b64: String,
    kdf: KdfParams,
}

/// The vault's salt and cost parameters, plus where they live on disk.
///
/// The salt is generated once at vault creation and never changes; the
/// parameters travel with it so an old vault stays decryptable after
/// the built-in defaults move.
#[derive(Debug, Clone)]
pub struct VaultMetadata {
    pub salt: [u8; SALT_LEN],
    pub kdf: KdfParams,
}

impl VaultMetadata {
    /// Load metadata from `data_dir`, accepting both the current JSON
    /// layout and the historical salt-only file. Returns `Ok(None)` when
    /// neither exists (vault not initialized).
    pub fn load(data_dir: &Path) -> Result<Option<Self>> {
        let meta_path = data_dir.join(META_FILE);
        if meta_path.exists() {
            let raw = fs::read_to_string(&meta_path)?;
            let meta: MetaOnDisk = serde_json::from_str(&raw)
                .map_err(|e| VaultError::format(format!("unparsable vault metadata: {e}")))?;
            let salt_bytes = BASE64
                .decode(&meta.salt_b64)
                .map_err(|e| VaultError::format(format!("bad salt encoding: {e}")))?;
            let salt: [u8; SALT_LEN] = salt_bytes
                .try_into()
                .map_err(|_| VaultError::format("bad salt length"))?;
            meta.kdf.validate()?;
            return Ok(Some(Self {
                salt,
                kdf: meta.kdf,
            }));
        }

        // Salt-only layout from before the params were recorded.
        let salt_path = data_dir.join(LEGACY_SALT_FILE);
        if salt_path.exists() {
            warn!("loading legacy salt-only vault metadata from {salt_path:?}");
            let salt_bytes = fs::read(&salt_path)?;
            let salt: [u8; SALT_LEN] = salt_bytes
                .try_into()
                .map_err(|_| VaultError::format("bad legacy salt length"))?;
            return Ok(Some(Self {
                salt,
                kdf: KdfParams::legacy(),
            }));
        }

        Ok(None)
    }

    /// Persist metadata in the current layout. Written before the
    /// verification token during setup, so a crash in between never
    /// leaves a token with no matching salt.
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        fs::create_dir_all(data_dir)?;
        let on_disk = MetaOnDisk {
            salt_b64: BASE64.encode(self.salt),
            kdf: self.kdf,
        };
        let json = serde_json::to_string_pretty(&on_disk)
            .map_err(|e| VaultError::format(format!("metadata serialization failed: {e}")))?;
        fs::write(data_dir.join(META_FILE), json)?;
        Ok(())
    }

    pub fn meta_path(data_dir: &Path) -> PathBuf {
        data_dir.join(META_FILE)
    }

    pub fn verify_path(data_dir: &Path) -> PathBuf {
        data_dir.join(VERIFY_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let meta = VaultMetadata {
            salt: [9u8; SALT_LEN],
            kdf: KdfParams::new(2048, 2, 1).unwrap(),
        };
        meta.save(dir.path()).unwrap();

        let loaded = VaultMetadata::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.salt, meta.salt);
        assert_eq!(loaded.kdf, meta.kdf);
    }

    #[test]
    fn missing_metadata_is_none() {
        let dir = tempdir().unwrap();
        assert!(VaultMetadata::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn legacy_salt_file_supplies_legacy_params() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(LEGACY_SALT_FILE), [5u8; SALT_LEN]).unwrap();

        let loaded = VaultMetadata::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.salt, [5u8; SALT_LEN]);
        assert_eq!(loaded.kdf, KdfParams::legacy());
    }

    #[test]
    fn garbage_metadata_is_format_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(META_FILE), b"not json").unwrap();
        match VaultMetadata::load(dir.path()) {
            Err(VaultError::Format(_)) => {}
            other => panic!("expected Format, got {other:?}"),
        }
    }
}
