//! Native encrypted export container.
//!
//! Layout, in order:
//! ```text
//! MAGIC (4) | VERSION (1) | META_LEN (4, big-endian) | META JSON | AEAD BLOB
//! ```
//! The metadata JSON carries the salt and KDF cost parameters, so a
//! standalone importer re-derives the key from the file itself and the
//! user's password — no live vault session is needed.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::{aead, derive_key, generate_salt, KdfParams};
use crate::error::{Result, VaultError};
use crate::store::Entry;

/// Magic marker identifying the container.
pub const MAGIC: &[u8; 4] = b"KFRT";
/// Current container version.
pub const VERSION: u8 = 1;

const HEADER_LEN: usize = MAGIC.len() + 1 + 4;

#[derive(Serialize, Deserialize)]
struct ContainerMeta {
    salt_b64: String,
    kdf: KdfParams,
}

/// Encrypt `entries` under a key derived from `password` and a fresh
/// salt. The embedded metadata makes the file self-describing.
pub fn export(entries: &[Entry], password: &str) -> Result<Vec<u8>> {
    if password.is_empty() {
        return Err(VaultError::validation("export password must not be empty"));
    }

    let salt = generate_salt()?;
    let kdf = KdfParams::default();
    let key = derive_key(password, &salt, kdf)?;

    let meta = ContainerMeta {
        salt_b64: BASE64.encode(salt),
        kdf,
    };
    let meta_json = serde_json::to_vec(&meta)
        .map_err(|e| VaultError::format(format!("metadata serialization failed: {e}")))?;

    let payload = Zeroizing::new(
        serde_json::to_vec(entries)
            .map_err(|e| VaultError::format(format!("entry serialization failed: {e}")))?,
    );
    let blob = aead::encrypt(&key, &payload)?;

    let mut out = Vec::with_capacity(HEADER_LEN + meta_json.len() + blob.len());
    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    out.extend_from_slice(&(meta_json.len() as u32).to_be_bytes());
    out.extend_from_slice(&meta_json);
    out.extend_from_slice(&blob);
    Ok(out)
}

/// Decrypt a container produced by [`export`].
///
/// Magic and version are validated before anything else; any length
/// mismatch is a format error, never a partial decrypt. A wrong password
/// surfaces as [`VaultError::Authentication`].
pub fn import(data: &[u8], password: &str) -> Result<Vec<Entry>> {
    if data.len() < HEADER_LEN {
        return Err(VaultError::format("file too short for container header"));
    }
    if &data[..MAGIC.len()] != MAGIC {
        return Err(VaultError::format("missing container magic"));
    }
    let version = data[MAGIC.len()];
    if version != VERSION {
        return Err(VaultError::format(format!(
            "unsupported container version: {version}"
        )));
    }

    let meta_len = u32::from_be_bytes(
        data[MAGIC.len() + 1..HEADER_LEN]
            .try_into()
            .expect("slice is exactly four bytes"),
    ) as usize;
    let meta_end = HEADER_LEN
        .checked_add(meta_len)
        .ok_or_else(|| VaultError::format("metadata length overflows"))?;
    if data.len() < meta_end {
        return Err(VaultError::format("truncated metadata section"));
    }

    let meta: ContainerMeta = serde_json::from_slice(&data[HEADER_LEN..meta_end])
        .map_err(|e| VaultError::format(format!("unparsable container metadata: {e}")))?;
    let salt = BASE64
        .decode(&meta.salt_b64)
        .map_err(|e| VaultError::format(format!("bad salt encoding: {e}")))?;

    let key = derive_key(password, &salt, meta.kdf)?;
    let payload = aead::decrypt(&key, &data[meta_end..])?;

    serde_json::from_slice(&payload)
        .map_err(|e| VaultError::format(format!("decrypted payload is not valid JSON: {e}")))
}
