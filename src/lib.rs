//! keyfort — a local, encrypted credential vault.
//!
//! A master password unlocks an Argon2id-derived key which encrypts every
//! record payload with XChaCha20-Poly1305. Plaintext index fields keep
//! listing and search cheap; import/export speaks the native encrypted
//! container plus CSV, free text and Samsung Pass.

pub mod crypto;
pub mod error;
pub mod format;
pub mod store;

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use log::info;

pub use crate::crypto::{CryptoHandler, KdfParams};
pub use crate::error::{Result, VaultError};
pub use crate::format::{ExportFormat, FileKind};
pub use crate::store::{Entry, EntryDetails, ImportStats, LoadOutcome, RecordStore};

const DB_FILE: &str = "keyfort.db";

/// Collaborator that resolves a site URL to a base64 icon during import
/// enrichment. Never required for correctness; a no-op implementation is
/// always acceptable.
pub trait IconFetcher {
    fn fetch(&self, url: &str) -> Option<String>;
}

/// Facade composing the crypto session and the record store over one
/// data directory.
pub struct Vault {
    crypto: CryptoHandler,
    store: RecordStore,
}

impl Vault {
    pub fn open(data_dir: &Path) -> Result<Self> {
        Self::open_with_kdf(data_dir, KdfParams::default())
    }

    /// Open with explicit KDF defaults for newly created vaults.
    pub fn open_with_kdf(data_dir: &Path, kdf: KdfParams) -> Result<Self> {
        let crypto = CryptoHandler::with_default_kdf(data_dir.to_path_buf(), kdf);
        let store = RecordStore::open(&data_dir.join(DB_FILE))?;
        Ok(Self { crypto, store })
    }

    pub fn is_initialized(&self) -> bool {
        self.crypto.is_initialized()
    }

    /// First-run setup with a fresh master password.
    pub fn setup(&self, password: &str) -> Result<()> {
        self.crypto.setup(password)
    }

    /// Attempt to unlock; wrong password is `Ok(false)`.
    pub fn unlock(&self, password: &str) -> Result<bool> {
        self.crypto.unlock(password)
    }

    pub fn lock(&self) {
        self.crypto.lock()
    }

    pub fn is_unlocked(&self) -> bool {
        self.crypto.is_unlocked()
    }

    /// Insert or update one entry.
    pub fn save_entry(
        &mut self,
        entry_id: Option<i64>,
        category: &str,
        name: &str,
        details: &EntryDetails,
    ) -> Result<i64> {
        self.store
            .save(&self.crypto, entry_id, category, name, details)
    }

    /// Decrypt and return all entries plus per-row diagnostics.
    pub fn entries(&self) -> Result<LoadOutcome> {
        self.store.get_all(&self.crypto)
    }

    pub fn delete_entry(&mut self, entry_id: i64) -> Result<()> {
        self.store.delete(entry_id)
    }

    /// Change the master password, re-encrypting every stored payload in
    /// one transaction. All-or-nothing.
    pub fn rotate_master_password(&mut self, old: &str, new: &str) -> Result<bool> {
        self.store
            .rotate_master_password(&self.crypto, old, new)
    }

    pub fn set_category_icon(&mut self, category: &str, icon_base64: &str) -> Result<()> {
        self.store.set_category_icon(category, icon_base64)
    }

    pub fn category_icons(&self) -> Result<std::collections::HashMap<String, String>> {
        self.store.get_category_icons()
    }

    /// Parse an interchange file and merge its records into the vault.
    pub fn import_file(&mut self, path: &Path, password: Option<&str>) -> Result<ImportStats> {
        self.import_file_with_icons(path, password, None)
    }

    /// Like [`Vault::import_file`], optionally enriching records that
    /// have a URL but no icon through the given fetcher.
    pub fn import_file_with_icons(
        &mut self,
        path: &Path,
        password: Option<&str>,
        fetcher: Option<&dyn IconFetcher>,
    ) -> Result<ImportStats> {
        let mut entries = format::import_path(path, password)?;

        if let Some(fetcher) = fetcher {
            for entry in &mut entries {
                if !entry.details.url.is_empty() && entry.details.icon_data.is_none() {
                    entry.details.icon_data = fetcher.fetch(&entry.details.url);
                }
            }
        }

        self.store.save_many(&self.crypto, &entries)
    }

    /// Serialize the current record set into the requested format.
    /// Corrupt rows are skipped, matching the listing behavior.
    pub fn export(&self, fmt: ExportFormat, password: Option<&str>) -> Result<Vec<u8>> {
        let outcome = self.entries()?;
        if !outcome.failures.is_empty() {
            info!(
                "export skipping {} unreadable entries",
                outcome.failures.len()
            );
        }
        format::export(&outcome.entries, fmt, password)
    }
}

/// Platform data directory for the default vault location.
pub fn default_data_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "keyfort")
        .ok_or_else(|| VaultError::validation("could not determine platform directories"))?;
    Ok(dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_vault(dir: &Path) -> Vault {
        Vault::open_with_kdf(dir, KdfParams::new(1024, 1, 1).unwrap()).unwrap()
    }

    fn details(username: &str, password: &str) -> EntryDetails {
        EntryDetails {
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    #[test]
    fn end_to_end_scenario() {
        let dir = tempdir().unwrap();
        let mut vault = test_vault(dir.path());

        vault.setup("Correct-1").unwrap();
        assert!(vault.is_initialized());

        vault.lock();
        assert!(!vault.unlock("Wrong-1").unwrap());
        assert!(vault.unlock("Correct-1").unwrap());

        vault
            .save_entry(None, "Work", "Example", &details("a@b.com", "p"))
            .unwrap();
        let outcome = vault.entries().unwrap();
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.entries[0].name, "Example");
        assert_eq!(outcome.entries[0].details.username, "a@b.com");
        assert_eq!(outcome.entries[0].details.password, "p");

        assert!(vault
            .rotate_master_password("Correct-1", "NewPass-2")
            .unwrap());
        vault.lock();
        assert!(!vault.unlock("Correct-1").unwrap());
        assert!(vault.unlock("NewPass-2").unwrap());

        let outcome = vault.entries().unwrap();
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.entries[0].details.username, "a@b.com");
        assert_eq!(outcome.entries[0].details.password, "p");
    }

    #[test]
    fn native_export_import_between_vaults() {
        let dir_a = tempdir().unwrap();
        let mut vault_a = test_vault(dir_a.path());
        vault_a.setup("pw-a").unwrap();
        vault_a
            .save_entry(None, "Work", "Example", &details("me", "secret"))
            .unwrap();

        let file = vault_a
            .export(ExportFormat::Native, Some("transfer-pw"))
            .unwrap();
        let path = dir_a.path().join("transfer.kfx");
        std::fs::write(&path, file).unwrap();

        // A completely separate vault under a different master password
        // imports via the file's own embedded KDF metadata.
        let dir_b = tempdir().unwrap();
        let mut vault_b = test_vault(dir_b.path());
        vault_b.setup("pw-b").unwrap();

        let stats = vault_b.import_file(&path, Some("transfer-pw")).unwrap();
        assert_eq!(stats.added, 1);

        let entries = vault_b.entries().unwrap().entries;
        assert_eq!(entries[0].details.password, "secret");
    }

    #[test]
    fn import_enriches_missing_icons() {
        struct FixedIcon;
        impl IconFetcher for FixedIcon {
            fn fetch(&self, _url: &str) -> Option<String> {
                Some("aWNvbg==".into())
            }
        }

        let dir = tempdir().unwrap();
        let mut vault = test_vault(dir.path());
        vault.setup("pw").unwrap();

        let csv_path = dir.path().join("import.csv");
        std::fs::write(
            &csv_path,
            "name,username,password,url\nExample,me,p,https://example.com\n",
        )
        .unwrap();

        let stats = vault
            .import_file_with_icons(&csv_path, None, Some(&FixedIcon))
            .unwrap();
        assert_eq!(stats.added, 1);

        let entries = vault.entries().unwrap().entries;
        assert_eq!(entries[0].details.icon_data.as_deref(), Some("aWNvbg=="));
    }
}
