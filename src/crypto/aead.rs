use chacha20poly1305::{
    aead::{Aead, KeyInit},
    Key, XChaCha20Poly1305, XNonce,
};
use getrandom::fill;
use zeroize::Zeroizing;

use super::{NONCE_LEN, SALT_LEN};
use crate::error::{Result, VaultError};

/// Fill buffer with cryptographically secure random bytes.
pub fn random_bytes(buf: &mut [u8]) -> Result<()> {
    fill(buf).map_err(|_| VaultError::validation("OS random generator unavailable"))
}

/// Generate a fresh vault salt.
pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    random_bytes(&mut salt)?;
    Ok(salt)
}

/// Encrypt plaintext with XChaCha20-Poly1305.
///
/// The output is self-contained: a random 24-byte nonce followed by the
/// AEAD ciphertext (tag included), so [`decrypt`] needs only the key and
/// the blob itself.
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));

    let mut nonce = [0u8; NONCE_LEN];
    random_bytes(&mut nonce)?;

    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|_| VaultError::validation("encryption failed"))?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Decrypt a blob produced by [`encrypt`].
///
/// A blob too short to hold a nonce is a [`VaultError::Format`]; a failed
/// tag check (wrong key or tampering) is [`VaultError::Authentication`].
pub fn decrypt(key: &[u8], blob: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if blob.len() < NONCE_LEN {
        return Err(VaultError::format("ciphertext too short"));
    }
    let (nonce, ciphertext) = blob.split_at(NONCE_LEN);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let plaintext = cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| VaultError::Authentication)?;
    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let key = [3u8; 32];
        let blob = encrypt(&key, b"secret data").unwrap();
        let plaintext = decrypt(&key, &blob).unwrap();
        assert_eq!(*plaintext, b"secret data");
    }

    #[test]
    fn wrong_key_is_authentication_failure() {
        let blob = encrypt(&[3u8; 32], b"secret data").unwrap();
        match decrypt(&[4u8; 32], &blob) {
            Err(VaultError::Authentication) => {}
            other => panic!("expected Authentication, got {other:?}"),
        }
    }

    #[test]
    fn tampered_blob_is_authentication_failure() {
        let key = [3u8; 32];
        let mut blob = encrypt(&key, b"secret data").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xff;
        match decrypt(&key, &blob) {
            Err(VaultError::Authentication) => {}
            other => panic!("expected Authentication, got {other:?}"),
        }
    }

    #[test]
    fn short_blob_is_format_error() {
        match decrypt(&[3u8; 32], &[0u8; 5]) {
            Err(VaultError::Format(_)) => {}
            other => panic!("expected Format, got {other:?}"),
        }
    }
}
