//! Persistent table of encrypted credential records.
//!
//! Plaintext index columns (`category`, `name`) live in `entries`; the
//! encrypted payload lives in `details`, 1:1 linked with cascade delete.
//! Category icons are independent of entries.

use std::collections::HashMap;
use std::path::Path;

use log::{error, info, warn};
use rusqlite::{params, Connection};
use zeroize::Zeroizing;

use crate::crypto::CryptoHandler;
use crate::error::{Result, VaultError};

pub mod entry;
pub mod migrate;

pub use entry::{Entry, EntryDetails};

/// Merge outcome of a bulk import: how many incoming records were
/// inserted, how many updated an existing entry, and how many were
/// exact duplicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// A row that could not be decrypted or parsed during a bulk listing.
#[derive(Debug)]
pub struct RowFailure {
    pub id: i64,
    pub error: VaultError,
}

/// Result of [`RecordStore::get_all`]: the decrypted entries plus a
/// diagnostics side channel for rows that were skipped. One corrupt row
/// must never lock the user out of the rest of the vault.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub entries: Vec<Entry>,
    pub failures: Vec<RowFailure>,
}

pub struct RecordStore {
    conn: Connection,
    /// Makes the next rotation's re-encryption transaction fail, to
    /// exercise the key-restore path. Test hook only.
    #[cfg(test)]
    fail_next_reencrypt: std::cell::Cell<bool>,
}

impl RecordStore {
    /// Open (or create) the database at `db_path`. Runs the legacy-schema
    /// check first, then ensures the current schema exists.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        migrate::check_and_migrate(db_path)?;

        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category TEXT NOT NULL,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS details (
                entry_id INTEGER PRIMARY KEY,
                data BLOB NOT NULL,
                FOREIGN KEY (entry_id) REFERENCES entries (id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS categories (
                name TEXT PRIMARY KEY NOT NULL,
                icon_data TEXT
            );
            "#,
        )?;

        info!("record store opened: {db_path:?}");
        Ok(Self {
            conn,
            #[cfg(test)]
            fail_next_reencrypt: std::cell::Cell::new(false),
        })
    }

    /// Insert (`entry_id` = None) or update an entry. The plaintext index
    /// write and the encrypted payload write happen in one transaction.
    /// Updating an id that does not exist is a validation error.
    pub fn save(
        &mut self,
        crypto: &CryptoHandler,
        entry_id: Option<i64>,
        category: &str,
        name: &str,
        details: &EntryDetails,
    ) -> Result<i64> {
        let blob = encrypt_details(crypto, details)?;

        let tx = self.conn.transaction()?;
        let id = match entry_id {
            Some(id) => {
                let affected = tx.execute(
                    "UPDATE entries SET category = ?1, name = ?2 WHERE id = ?3",
                    params![category, name, id],
                )?;
                if affected == 0 {
                    return Err(VaultError::validation(format!("no entry with id {id}")));
                }
                tx.execute(
                    "UPDATE details SET data = ?1 WHERE entry_id = ?2",
                    params![blob, id],
                )?;
                info!("updated entry '{name}' (id {id})");
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO entries (category, name) VALUES (?1, ?2)",
                    params![category, name],
                )?;
                let id = tx.last_insert_rowid();
                tx.execute(
                    "INSERT INTO details (entry_id, data) VALUES (?1, ?2)",
                    params![id, blob],
                )?;
                info!("created entry '{name}' (id {id})");
                id
            }
        };
        tx.commit()?;
        Ok(id)
    }

    /// Bulk import with merge semantics, in one transaction.
    ///
    /// Classification per incoming record, against the current vault:
    /// an exact content match is skipped; a record sharing (name,
    /// username) with an existing entry updates that entry; anything
    /// else is inserted as new.
    pub fn save_many(
        &mut self,
        crypto: &CryptoHandler,
        incoming: &[Entry],
    ) -> Result<ImportStats> {
        if incoming.is_empty() {
            return Ok(ImportStats::default());
        }

        // Decrypt the current state up front; corrupt rows simply cannot
        // participate in matching.
        let existing = self.get_all(crypto)?;
        let mut by_natural_key: HashMap<(String, String), Entry> = existing
            .entries
            .into_iter()
            .map(|e| ((e.name.clone(), e.details.username.clone()), e))
            .collect();

        let mut stats = ImportStats::default();
        let tx = self.conn.transaction()?;

        for record in incoming {
            if record.name.is_empty() {
                warn!("skipping malformed import record with no name");
                stats.skipped += 1;
                continue;
            }

            let key = (record.name.clone(), record.details.username.clone());
            match by_natural_key.get(&key) {
                Some(current) if current.same_content(record) => {
                    stats.skipped += 1;
                }
                Some(current) => {
                    let id = current.id.expect("stored entry always has an id");
                    let blob = encrypt_details(crypto, &record.details)?;
                    tx.execute(
                        "UPDATE entries SET category = ?1, name = ?2 WHERE id = ?3",
                        params![record.category, record.name, id],
                    )?;
                    tx.execute(
                        "UPDATE details SET data = ?1 WHERE entry_id = ?2",
                        params![blob, id],
                    )?;
                    let mut merged = record.clone();
                    merged.id = Some(id);
                    by_natural_key.insert(key, merged);
                    stats.updated += 1;
                }
                None => {
                    let blob = encrypt_details(crypto, &record.details)?;
                    tx.execute(
                        "INSERT INTO entries (category, name) VALUES (?1, ?2)",
                        params![record.category, record.name],
                    )?;
                    let id = tx.last_insert_rowid();
                    tx.execute(
                        "INSERT INTO details (entry_id, data) VALUES (?1, ?2)",
                        params![id, blob],
                    )?;
                    let mut inserted = record.clone();
                    inserted.id = Some(id);
                    by_natural_key.insert(key, inserted);
                    stats.added += 1;
                }
            }
        }

        tx.commit()?;
        info!(
            "bulk import committed: {} added, {} updated, {} skipped",
            stats.added, stats.updated, stats.skipped
        );
        Ok(stats)
    }

    /// Decrypt every row. Rows that fail to decrypt or parse are reported
    /// in the diagnostics list and skipped, never aborting the listing.
    pub fn get_all(&self, crypto: &CryptoHandler) -> Result<LoadOutcome> {
        let mut stmt = self.conn.prepare(
            "SELECT e.id, e.category, e.name, d.data
             FROM entries e JOIN details d ON e.id = d.entry_id
             ORDER BY e.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Vec<u8>>(3)?,
            ))
        })?;

        let mut outcome = LoadOutcome::default();
        for row in rows {
            let (id, category, name, blob) = row?;
            match decrypt_details(crypto, &blob) {
                Ok(details) => outcome.entries.push(Entry {
                    id: Some(id),
                    category,
                    name,
                    details,
                }),
                Err(VaultError::Locked) => return Err(VaultError::Locked),
                Err(e) => {
                    error!("failed to load entry (id {id}): {e}");
                    outcome.failures.push(RowFailure { id, error: e });
                }
            }
        }

        info!(
            "loaded {} entries ({} skipped)",
            outcome.entries.len(),
            outcome.failures.len()
        );
        Ok(outcome)
    }

    /// Delete an entry; the cascade removes its payload. Deleting a
    /// missing id is a logged no-op.
    pub fn delete(&mut self, entry_id: i64) -> Result<()> {
        let affected = self
            .conn
            .execute("DELETE FROM entries WHERE id = ?1", params![entry_id])?;
        if affected > 0 {
            info!("deleted entry (id {entry_id})");
        } else {
            warn!("attempted to delete non-existent entry (id {entry_id})");
        }
        Ok(())
    }

    /// Full master-password rotation: every payload is decrypted under
    /// the old key in memory first; only then is the crypto layer rotated
    /// and every row re-encrypted inside one transaction.
    ///
    /// If any row fails to decrypt up front the operation aborts with no
    /// changes, so the vault can never end up split between two keys.
    pub fn rotate_master_password(
        &mut self,
        crypto: &CryptoHandler,
        old_password: &str,
        new_password: &str,
    ) -> Result<bool> {
        info!("starting master password rotation");

        let mut decrypted: Vec<(i64, Zeroizing<Vec<u8>>)> = Vec::new();
        {
            let mut stmt = self
                .conn
                .prepare("SELECT entry_id, data FROM details ORDER BY entry_id")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
            })?;
            for row in rows {
                let (id, blob) = row?;
                match crypto.decrypt(&blob) {
                    Ok(plaintext) => decrypted.push((id, plaintext)),
                    Err(VaultError::Authentication) => {
                        error!("entry {id} failed to decrypt under the current key; aborting rotation");
                        return Ok(false);
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        if !crypto.rotate(old_password, new_password)? {
            error!("crypto layer rejected the password change; aborting rotation");
            return Ok(false);
        }

        #[cfg(test)]
        let fail_reencrypt = self.fail_next_reencrypt.take();

        let reencrypt = |conn: &mut Connection| -> Result<()> {
            let tx = conn.transaction()?;
            #[cfg(test)]
            if fail_reencrypt {
                return Err(VaultError::validation("re-encryption failure requested"));
            }
            for (id, plaintext) in &decrypted {
                let blob = crypto.encrypt(plaintext)?;
                tx.execute(
                    "UPDATE details SET data = ?1 WHERE entry_id = ?2",
                    params![blob, id],
                )?;
            }
            tx.commit()?;
            Ok(())
        };

        match reencrypt(&mut self.conn) {
            Ok(()) => {
                info!("all {} entries re-encrypted; rotation complete", decrypted.len());
                Ok(true)
            }
            Err(e) => {
                // The payload transaction rolled back, so the rows are
                // still under the old key. Restore the crypto layer to
                // match before reporting failure.
                error!("re-encryption failed ({e}); restoring the previous key");
                if !crypto.rotate(new_password, old_password)? {
                    error!("could not restore the previous key after failed rotation");
                    return Err(e);
                }
                Ok(false)
            }
        }
    }

    /// Upsert a category icon. Independent of entry encryption.
    pub fn set_category_icon(&mut self, category: &str, icon_base64: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO categories (name, icon_data) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET icon_data = excluded.icon_data",
            params![category, icon_base64],
        )?;
        info!("saved icon for category '{category}'");
        Ok(())
    }

    pub fn get_category_icons(&self) -> Result<HashMap<String, String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, icon_data FROM categories WHERE icon_data IS NOT NULL")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut icons = HashMap::new();
        for row in rows {
            let (name, icon) = row?;
            icons.insert(name, icon);
        }
        Ok(icons)
    }

    /// Overwrite one payload blob directly. Test hook for simulating
    /// corruption; not part of the public vault surface.
    #[cfg(test)]
    pub(crate) fn corrupt_payload(&mut self, entry_id: i64, blob: &[u8]) -> Result<()> {
        self.conn.execute(
            "UPDATE details SET data = ?1 WHERE entry_id = ?2",
            params![blob, entry_id],
        )?;
        Ok(())
    }
}

fn encrypt_details(crypto: &CryptoHandler, details: &EntryDetails) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(details)
        .map_err(|e| VaultError::format(format!("detail serialization failed: {e}")))?;
    crypto.encrypt(&json)
}

fn decrypt_details(crypto: &CryptoHandler, blob: &[u8]) -> Result<EntryDetails> {
    let plaintext = crypto.decrypt(blob)?;
    serde_json::from_slice(&plaintext)
        .map_err(|e| VaultError::format(format!("detail payload is not valid JSON: {e}")))
}
