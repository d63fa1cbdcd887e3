use serde::{Deserialize, Serialize};

/// The sensitive half of a credential record. Serialized to JSON and
/// stored only as an authenticated-encrypted blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDetails {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub notes: String,
    /// Base64-encoded favicon image, if one was fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_data: Option<String>,
    /// Base32 TOTP seed, if two-factor codes are configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totp_secret: Option<String>,
    #[serde(default)]
    pub backup_codes: String,
}

/// One credential record. `category` and `name` stay in plaintext so that
/// listing, searching and filtering never pay the decryption cost; only
/// `details` is encrypted at rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Store-assigned id; `None` until the entry has been persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub category: String,
    pub name: String,
    pub details: EntryDetails,
}

impl Entry {
    pub fn new(category: impl Into<String>, name: impl Into<String>, details: EntryDetails) -> Self {
        Self {
            id: None,
            category: category.into(),
            name: name.into(),
            details,
        }
    }

    /// Field-for-field equality ignoring the store-assigned id. Used by
    /// the import merge to detect exact duplicates.
    pub fn same_content(&self, other: &Entry) -> bool {
        self.category == other.category
            && self.name == other.name
            && self.details == other.details
    }
}
