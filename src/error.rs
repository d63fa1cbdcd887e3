use thiserror::Error;

/// Failure taxonomy of the vault engine.
///
/// Callers are expected to match on the variant, never on message text:
/// each kind maps to a distinct user-facing situation.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Wrong key or tampered/corrupted ciphertext. Routine during password
    /// prompting; always recoverable by asking again.
    #[error("authentication failed: wrong password or corrupted data")]
    Authentication,

    /// An encrypt/decrypt call was made while no session key is held.
    #[error("vault is locked")]
    Locked,

    /// Malformed container: bad magic, truncated section, unparsable JSON.
    /// Distinct from [`VaultError::Authentication`] so the user sees
    /// "file is corrupt" rather than "wrong password".
    #[error("format error: {0}")]
    Format(String),

    /// Caller-supplied input rejected before any crypto was attempted.
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, VaultError>;

impl VaultError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        VaultError::Format(msg.into())
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        VaultError::Validation(msg.into())
    }
}
