//! Samsung Pass (`.spass`) interop.
//!
//! Wire format, replicated byte-for-byte from the real exports: the file
//! is base64 over `salt(20) | iv(16) | AES-256-CBC ciphertext`, key
//! derived with PBKDF2-HMAC-SHA256 at 70 000 iterations, PKCS#7 padding.
//! The plaintext is a set of `next_table`-separated tables; the login
//! table is `;`-separated CSV whose fields are individually base64
//! encoded, with `%%NULL%%` (itself base64) standing in for empty.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use csv::{ReaderBuilder, WriterBuilder};
use log::info;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use crate::crypto::random_bytes;
use crate::error::{Result, VaultError};
use crate::store::{Entry, EntryDetails};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const SALT_LEN: usize = 20;
const IV_LEN: usize = 16;
const PBKDF2_ROUNDS: u32 = 70_000;

/// Base64 of the `&&&NULL&&&` placeholder Samsung writes for empty fields.
const NULL_SENTINEL: &str = "JiYmTlVMTCYmJg==";

/// Fixed header of the login-data table inside a .spass file.
const LOGIN_HEADER: &str = "_id;origin_url;action_url;username_element;username_value;id_tz_enc;password_element;password_value;pw_tz_enc;host_url;ssl_valid;preferred;blacklisted_by_user;use_additional_auth;cm_api_support;created_time;modified_time;title;favicon;source_type;app_name;package_name;package_signature;reserved_1;reserved_2;reserved_3;reserved_4;reserved_5;reserved_6;reserved_7;reserved_8;credential_memo;otp";

fn derive(password: &str, salt: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
    key
}

fn decode_field(raw: &str) -> String {
    if raw.is_empty() || raw == NULL_SENTINEL {
        return String::new();
    }
    // Samsung sometimes drops base64 padding; restore it before decoding.
    let mut padded = raw.to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    match BASE64.decode(&padded) {
        Ok(bytes) => String::from_utf8(bytes).unwrap_or_else(|_| raw.to_string()),
        Err(_) => raw.to_string(),
    }
}

fn encode_field(data: &str) -> String {
    if data.is_empty() {
        return NULL_SENTINEL.to_string();
    }
    BASE64.encode(data.as_bytes())
}

/// Reduce an `android://<sig>@<package>` app link to a plain domain where
/// possible; anything else passes through untouched.
pub(crate) fn clean_android_url(url: &str) -> String {
    let Some(rest) = url.strip_prefix("android://") else {
        return url.to_string();
    };

    // Reverse-domain package names usually invert back to a usable
    // domain; packages ending in ".android" and the like do not.
    let package = rest.rsplit('@').next().unwrap_or(rest);
    let parts: Vec<&str> = package.split('.').collect();
    if parts.len() >= 2 {
        let domain = format!("{}.{}", parts[parts.len() - 2], parts[parts.len() - 1]);
        if !domain.contains("android") {
            return domain;
        }
    }
    package.to_string()
}

/// Decrypt and parse a Samsung Pass export.
pub fn import(file_content: &[u8], password: &str) -> Result<Vec<Entry>> {
    let outer = std::str::from_utf8(file_content)
        .map_err(|_| VaultError::format("spass file is not valid base64 text"))?;
    let binary = BASE64
        .decode(outer.trim())
        .map_err(|_| VaultError::format("spass file is not valid base64 text"))?;

    if binary.len() < SALT_LEN + IV_LEN + 16 {
        return Err(VaultError::format("spass file too short"));
    }
    let salt = &binary[..SALT_LEN];
    let iv = &binary[SALT_LEN..SALT_LEN + IV_LEN];
    let ciphertext = &binary[SALT_LEN + IV_LEN..];

    let iv: [u8; IV_LEN] = iv.try_into().expect("length checked above");
    let key = derive(password, salt);
    let plaintext = Aes256CbcDec::new(&key.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        // CBC gives no real integrity check; a bad pad is the closest
        // signal for a wrong password.
        .map_err(|_| VaultError::Authentication)?;
    let content = String::from_utf8(plaintext).map_err(|_| VaultError::Authentication)?;

    let entries = parse_decrypted(&content)?;
    info!("parsed {} entries from spass file", entries.len());
    Ok(entries)
}

fn parse_decrypted(content: &str) -> Result<Vec<Entry>> {
    let login_block = content
        .split("next_table")
        .map(str::trim)
        .find(|block| block.starts_with(LOGIN_HEADER))
        .ok_or_else(|| {
            VaultError::format("could not find the login data block in the decrypted content")
        })?;

    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(login_block.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| VaultError::format(format!("bad spass table header: {e}")))?
        .clone();
    let column = |name: &str| headers.iter().position(|h| h == name);

    let (Some(title_col), Some(user_col), Some(pass_col), Some(url_col), Some(memo_col)) = (
        column("title"),
        column("username_value"),
        column("password_value"),
        column("origin_url"),
        column("credential_memo"),
    ) else {
        return Err(VaultError::format("spass login table is missing columns"));
    };

    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| VaultError::format(format!("bad spass row: {e}")))?;
        let get = |idx: usize| decode_field(record.get(idx).unwrap_or("").trim());

        let name = get(title_col);
        if name.is_empty() {
            continue;
        }

        entries.push(Entry::new(
            "Samsung Pass",
            name,
            EntryDetails {
                username: get(user_col),
                password: get(pass_col),
                url: clean_android_url(&get(url_col)),
                notes: get(memo_col),
                ..Default::default()
            },
        ));
    }
    Ok(entries)
}

/// Pack entries into a Samsung Pass compatible file.
pub fn export(entries: &[Entry], password: &str) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .delimiter(b';')
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(Vec::new());
    writer
        .write_record(LOGIN_HEADER.split(';'))
        .map_err(|e| VaultError::format(format!("spass write failed: {e}")))?;

    for (i, entry) in entries.iter().enumerate() {
        let d = &entry.details;
        let empty = encode_field("");
        let row = vec![
            (i + 1).to_string(),
            encode_field(&d.url),      // origin_url
            empty.clone(),             // action_url
            empty.clone(),             // username_element
            encode_field(&d.username), // username_value
            empty.clone(),             // id_tz_enc
            empty.clone(),             // password_element
            encode_field(&d.password), // password_value
            empty.clone(),             // pw_tz_enc
            encode_field(&d.url),      // host_url
            encode_field("true"),      // ssl_valid
            encode_field("true"),      // preferred
            encode_field("false"),     // blacklisted_by_user
            encode_field("false"),     // use_additional_auth
            encode_field("false"),     // cm_api_support
            encode_field("0"),         // created_time
            encode_field("0"),         // modified_time
            encode_field(&entry.name), // title
            empty.clone(),             // favicon
            encode_field("0"),         // source_type
            empty.clone(),             // app_name
            empty.clone(),             // package_name
            empty.clone(),             // package_signature
            empty.clone(),             // reserved_1
            empty.clone(),             // reserved_2
            empty.clone(),             // reserved_3
            empty.clone(),             // reserved_4
            empty.clone(),             // reserved_5
            empty.clone(),             // reserved_6
            empty.clone(),             // reserved_7
            empty.clone(),             // reserved_8
            encode_field(&d.notes),    // credential_memo
            empty,                     // otp
        ];
        writer
            .write_record(&row)
            .map_err(|e| VaultError::format(format!("spass write failed: {e}")))?;
    }

    let plaintext = writer
        .into_inner()
        .map_err(|e| VaultError::format(format!("spass write failed: {e}")))?;

    let mut salt = [0u8; SALT_LEN];
    random_bytes(&mut salt)?;
    let mut iv = [0u8; IV_LEN];
    random_bytes(&mut iv)?;

    let key = derive(password, &salt);
    let ciphertext =
        Aes256CbcEnc::new(&key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(&plaintext);

    let mut binary = Vec::with_capacity(SALT_LEN + IV_LEN + ciphertext.len());
    binary.extend_from_slice(&salt);
    binary.extend_from_slice(&iv);
    binary.extend_from_slice(&ciphertext);

    info!("encrypted {} entries for spass export", entries.len());
    Ok(BASE64.encode(binary).into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let entries = vec![
            Entry::new(
                "Work",
                "Example",
                EntryDetails {
                    username: "a@b.com".into(),
                    password: "p;with;semicolons".into(),
                    url: "https://example.com".into(),
                    notes: "memo".into(),
                    ..Default::default()
                },
            ),
            Entry::new("Work", "NoFields", EntryDetails::default()),
        ];

        let file = export(&entries, "pw").unwrap();
        let imported = import(&file, "pw").unwrap();

        assert_eq!(imported.len(), 2);
        assert_eq!(imported[0].name, "Example");
        assert_eq!(imported[0].category, "Samsung Pass");
        assert_eq!(imported[0].details.username, "a@b.com");
        assert_eq!(imported[0].details.password, "p;with;semicolons");
        assert_eq!(imported[0].details.notes, "memo");
        assert_eq!(imported[1].details.password, "");
    }

    #[test]
    fn wrong_password_is_authentication_failure() {
        let file = export(&[], "pw").unwrap();
        assert!(matches!(
            import(&file, "other"),
            Err(VaultError::Authentication)
        ));
    }

    #[test]
    fn non_base64_file_is_format_error() {
        assert!(matches!(
            import(b"!!! not base64 !!!", "pw"),
            Err(VaultError::Format(_))
        ));
    }

    #[test]
    fn android_links_reduce_to_domains() {
        assert_eq!(
            clean_android_url("android://sig@com.example.app"),
            "example.app"
        );
        // packages that invert to an "android" pseudo-domain stay packages
        assert_eq!(
            clean_android_url("android://sig@com.twitter.android"),
            "com.twitter.android"
        );
        assert_eq!(
            clean_android_url("https://example.com/login"),
            "https://example.com/login"
        );
        assert_eq!(clean_android_url(""), "");
    }
}
