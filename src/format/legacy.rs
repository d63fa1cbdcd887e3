//! Legacy encrypted export container (import only).
//!
//! The first generation of encrypted exports was an ad hoc JSON object:
//! salt plus the base64 AEAD blob, with newer files also embedding their
//! KDF parameters. Files without explicit parameters were written under
//! the fixed legacy defaults, so the importer sniffs which convention a
//! given file uses.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;

use crate::crypto::{aead, derive_key, KdfParams};
use crate::error::{Result, VaultError};
use crate::store::Entry;

#[derive(Deserialize)]
struct LegacyContainer {
    salt: String,
    data: String,
    /// Absent in the oldest files; those used the fixed legacy defaults.
    #[serde(default)]
    kdf: Option<KdfParams>,
}

pub fn import(data: &[u8], password: &str) -> Result<Vec<Entry>> {
    let container: LegacyContainer = serde_json::from_slice(data)
        .map_err(|_| VaultError::format("not a legacy export file"))?;

    let salt = BASE64
        .decode(&container.salt)
        .map_err(|e| VaultError::format(format!("bad salt encoding: {e}")))?;
    let blob = BASE64
        .decode(&container.data)
        .map_err(|e| VaultError::format(format!("bad payload encoding: {e}")))?;

    let kdf = container.kdf.unwrap_or_else(KdfParams::legacy);
    let key = derive_key(password, &salt, kdf)?;
    let payload = aead::decrypt(&key, &blob)?;

    serde_json::from_slice(&payload)
        .map_err(|e| VaultError::format(format!("decrypted payload is not valid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_salt;
    use crate::store::EntryDetails;

    fn fabricate(password: &str, kdf: Option<KdfParams>, entries: &[Entry]) -> Vec<u8> {
        let salt = generate_salt().unwrap();
        let key = derive_key(password, &salt, kdf.unwrap_or_else(KdfParams::legacy)).unwrap();
        let blob = aead::encrypt(&key, &serde_json::to_vec(entries).unwrap()).unwrap();
        let mut value = serde_json::json!({
            "salt": BASE64.encode(salt),
            "data": BASE64.encode(blob),
        });
        if let Some(kdf) = kdf {
            value["kdf"] = serde_json::to_value(kdf).unwrap();
        }
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn imports_file_with_explicit_params() {
        let entries = vec![Entry::new("Work", "Example", EntryDetails::default())];
        let kdf = KdfParams::new(1024, 1, 1).unwrap();
        let file = fabricate("pw", Some(kdf), &entries);
        assert_eq!(import(&file, "pw").unwrap(), entries);
    }

    #[test]
    fn imports_file_with_legacy_default_params() {
        let entries = vec![Entry::new("Work", "Example", EntryDetails::default())];
        let file = fabricate("pw", None, &entries);
        assert_eq!(import(&file, "pw").unwrap(), entries);
    }

    #[test]
    fn wrong_password_is_authentication_failure() {
        let file = fabricate("pw", Some(KdfParams::new(1024, 1, 1).unwrap()), &[]);
        assert!(matches!(
            import(&file, "other"),
            Err(VaultError::Authentication)
        ));
    }

    #[test]
    fn garbage_is_format_error() {
        assert!(matches!(
            import(b"definitely not json", "pw"),
            Err(VaultError::Format(_))
        ));
    }
}
