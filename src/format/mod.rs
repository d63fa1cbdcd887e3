//! Portable interchange formats for the decrypted record set.
//!
//! Each supported format is a variant of an enum with exhaustive
//! matching at the call site — no runtime string dispatch. The encrypted
//! container sniffs its own generation (binary-with-magic vs the legacy
//! JSON layout) so old export files stay importable.

use std::fs;
use std::path::Path;

use log::info;

use crate::error::{Result, VaultError};
use crate::store::Entry;

pub mod csv;
pub mod legacy;
pub mod native;
pub mod spass;
pub mod text;

/// File kinds the import path understands, resolved from the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// `.kfx` — the vault's own encrypted container, either generation.
    Encrypted,
    /// `.csv` — Chrome exports or any generic password CSV.
    Csv,
    /// `.txt` / `.md` — free-text notes in one of two line formats.
    Text,
    /// `.spass` — Samsung Pass encrypted export.
    SamsungPass,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "kfx" | "skey" => Ok(FileKind::Encrypted),
            "csv" => Ok(FileKind::Csv),
            "txt" | "md" => Ok(FileKind::Text),
            "spass" => Ok(FileKind::SamsungPass),
            other => Err(VaultError::validation(format!(
                "unsupported file format: .{other}"
            ))),
        }
    }

    pub fn needs_password(self) -> bool {
        matches!(self, FileKind::Encrypted | FileKind::SamsungPass)
    }
}

/// Formats the export path can produce. Only the newest encrypted
/// container layout is ever written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Native,
    Csv { include_totp: bool },
    SamsungPass,
}

/// Parse an import file into entries. `password` is required for the
/// encrypted kinds and ignored otherwise.
pub fn import_path(path: &Path, password: Option<&str>) -> Result<Vec<Entry>> {
    let kind = FileKind::from_path(path)?;
    info!("importing {path:?} as {kind:?}");

    if kind.needs_password() && password.is_none() {
        return Err(VaultError::validation(
            "a password is required to decrypt this file",
        ));
    }

    let entries = match kind {
        FileKind::Encrypted => {
            let bytes = fs::read(path)?;
            let password = password.unwrap();
            if bytes.starts_with(native::MAGIC) {
                native::import(&bytes, password)?
            } else {
                legacy::import(&bytes, password)?
            }
        }
        FileKind::Csv => {
            let content = read_text(path)?;
            csv::import_str(&content)?
        }
        FileKind::Text => {
            let content = read_text(path)?;
            text::import_str(&content)
        }
        FileKind::SamsungPass => {
            let bytes = fs::read(path)?;
            spass::import(&bytes, password.unwrap())?
        }
    };

    info!("parsed {} entries from {path:?}", entries.len());
    Ok(entries)
}

/// Serialize entries into the requested format. `password` is required
/// for the encrypted formats.
pub fn export(entries: &[Entry], format: ExportFormat, password: Option<&str>) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Native => {
            let password = password.ok_or_else(|| {
                VaultError::validation("a password is required for an encrypted export")
            })?;
            native::export(entries, password)
        }
        ExportFormat::Csv { include_totp } => {
            Ok(csv::export(entries, include_totp)?.into_bytes())
        }
        ExportFormat::SamsungPass => {
            let password = password.ok_or_else(|| {
                VaultError::validation("a password is required for a Samsung Pass export")
            })?;
            spass::export(entries, password)
        }
    }
}

/// Read a text file, tolerating a UTF-8 BOM.
fn read_text(path: &Path) -> Result<String> {
    let raw = fs::read(path)?;
    let raw = raw.strip_prefix(b"\xef\xbb\xbf").unwrap_or(&raw);
    String::from_utf8(raw.to_vec())
        .map_err(|_| VaultError::format("file is not valid UTF-8"))
}
