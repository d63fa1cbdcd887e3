//! Plaintext CSV export and import.
//!
//! Import recognizes the Google Chrome export header outright and falls
//! back to a generic parser driven by a column-alias table, so files from
//! differently-localized tools still map onto the standard fields. TOTP
//! secrets are written as full `otpauth://` URIs so the CSV stays usable
//! by other authenticator tools, and parsed back to bare secrets on
//! import.

use csv::{ReaderBuilder, WriterBuilder};
use log::{info, warn};

use crate::error::{Result, VaultError};
use crate::store::{Entry, EntryDetails};

/// Column synonyms across tools and locales, keyed by standard field.
const KEY_ALIASES: &[(&str, &[&str])] = &[
    ("name", &["name", "title", "名称"]),
    (
        "username",
        &["username", "usename", "login", "user", "user id", "用户名", "用户"],
    ),
    ("email", &["email", "邮箱"]),
    ("password", &["password", "pass", "密码"]),
    ("url", &["url", "website", "address", "uri", "网址", "地址"]),
    ("notes", &["notes", "remark", "extra", "备注"]),
    ("category", &["category", "cat", "group", "folder", "分类"]),
    (
        "totp",
        &["totp", "otpauth", "2fa", "2fa_app", "authenticator", "两步验证"],
    ),
];

/// The exact lowercase header of a Google Chrome password export.
const CHROME_HEADER: &[&str] = &["name", "url", "username", "password"];

/// Map a raw column header onto its standard field name.
pub(crate) fn alias_to_field(header: &str) -> Option<&'static str> {
    let header = header.trim().to_lowercase();
    KEY_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.contains(&header.as_str()))
        .map(|(field, _)| *field)
}

/// Extract the `secret` parameter from an `otpauth://` URI.
pub(crate) fn secret_from_otpauth(uri: &str) -> Option<String> {
    let query = uri.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "secret" && !value.is_empty()).then(|| value.to_string())
    })
}

fn totp_uri(entry: &Entry, secret: &str) -> String {
    let issuer = entry.name.replace(':', "");
    let account = if !entry.details.username.is_empty() {
        entry.details.username.replace(':', "")
    } else if !entry.details.email.is_empty() {
        entry.details.email.replace(':', "")
    } else {
        "account".to_string()
    };
    format!("otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}")
}

/// Serialize entries to CSV. Lossy and insecure by design; warning the
/// user is the caller's job.
pub fn export(entries: &[Entry], include_totp: bool) -> Result<String> {
    let mut header = vec![
        "name", "username", "email", "password", "url", "notes", "category",
    ];
    if include_totp {
        header.push("totp");
    }

    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer
        .write_record(&header)
        .map_err(|e| VaultError::format(format!("CSV write failed: {e}")))?;

    for entry in entries {
        let d = &entry.details;
        let mut row = vec![
            entry.name.clone(),
            d.username.clone(),
            d.email.clone(),
            d.password.clone(),
            d.url.clone(),
            d.notes.clone(),
            entry.category.clone(),
        ];
        if include_totp {
            row.push(match d.totp_secret.as_deref() {
                Some(secret) if !secret.is_empty() => totp_uri(entry, secret),
                _ => String::new(),
            });
        }
        writer
            .write_record(&row)
            .map_err(|e| VaultError::format(format!("CSV write failed: {e}")))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| VaultError::format(format!("CSV write failed: {e}")))?;
    String::from_utf8(bytes).map_err(|_| VaultError::format("CSV output was not UTF-8"))
}

/// Parse CSV content into entries, sniffing the Chrome layout first.
pub fn import_str(content: &str) -> Result<Vec<Entry>> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| VaultError::format(format!("unreadable CSV header: {e}")))?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    if headers == CHROME_HEADER {
        info!("detected Google Chrome CSV export");
        return import_chrome(&mut reader);
    }

    info!("no specific CSV format detected, using generic parser");
    import_generic(&mut reader, &headers)
}

fn import_chrome(reader: &mut csv::Reader<&[u8]>) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| VaultError::format(format!("bad CSV row: {e}")))?;
        let name = record.get(0).unwrap_or("").trim();
        if name.is_empty() {
            continue;
        }
        entries.push(Entry::new(
            "",
            name,
            EntryDetails {
                url: record.get(1).unwrap_or("").trim().to_string(),
                username: record.get(2).unwrap_or("").trim().to_string(),
                password: record.get(3).unwrap_or("").to_string(),
                ..Default::default()
            },
        ));
    }
    Ok(entries)
}

fn import_generic(reader: &mut csv::Reader<&[u8]>, headers: &[String]) -> Result<Vec<Entry>> {
    let mut columns: Vec<(usize, &'static str)> = Vec::new();
    for (idx, header) in headers.iter().enumerate() {
        if let Some(field) = alias_to_field(header) {
            if !columns.iter().any(|(_, f)| *f == field) {
                columns.push((idx, field));
            }
        }
    }

    if !columns.iter().any(|(_, f)| *f == "name") {
        return Err(VaultError::validation(
            "CSV file is missing a recognizable 'name' or 'title' column",
        ));
    }

    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| VaultError::format(format!("bad CSV row: {e}")))?;
        let field = |wanted: &str| -> &str {
            columns
                .iter()
                .find(|(_, f)| *f == wanted)
                .and_then(|(idx, _)| record.get(*idx))
                .unwrap_or("")
                .trim()
        };

        let name = field("name");
        if name.is_empty() {
            continue;
        }

        let mut details = EntryDetails {
            username: field("username").to_string(),
            email: field("email").to_string(),
            password: field("password").to_string(),
            url: field("url").to_string(),
            notes: field("notes").to_string(),
            ..Default::default()
        };

        let totp = field("totp");
        if totp.starts_with("otpauth://") {
            match secret_from_otpauth(totp) {
                Some(secret) => details.totp_secret = Some(secret),
                None => warn!("could not parse TOTP URI for entry '{name}'"),
            }
        }

        entries.push(Entry::new(field("category"), name, details));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otpauth_secret_extraction() {
        let uri = "otpauth://totp/Site:me?secret=JBSWY3DPEHPK3PXP&issuer=Site";
        assert_eq!(
            secret_from_otpauth(uri).as_deref(),
            Some("JBSWY3DPEHPK3PXP")
        );
        assert_eq!(secret_from_otpauth("otpauth://totp/Site:me"), None);
    }

    #[test]
    fn export_then_import_preserves_fields() {
        let mut entry = Entry::new("Work", "Example", EntryDetails::default());
        entry.details.username = "a@b.com".into();
        entry.details.password = "p,with,commas".into();
        entry.details.totp_secret = Some("JBSWY3DPEHPK3PXP".into());

        let out = export(&[entry], true).unwrap();
        let imported = import_str(&out).unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].name, "Example");
        assert_eq!(imported[0].category, "Work");
        assert_eq!(imported[0].details.password, "p,with,commas");
        assert_eq!(
            imported[0].details.totp_secret.as_deref(),
            Some("JBSWY3DPEHPK3PXP")
        );
    }

    #[test]
    fn chrome_export_is_detected() {
        let content = "name,url,username,password\n\
                       Example,https://example.com,me,p1\n\
                       ,https://skip.me,nobody,p2\n";
        let imported = import_str(content).unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].details.url, "https://example.com");
        assert_eq!(imported[0].category, "");
    }

    #[test]
    fn localized_aliases_are_recognized() {
        let content = "名称,用户名,密码\nExample,me,p1\n";
        let imported = import_str(content).unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].details.username, "me");
        assert_eq!(imported[0].details.password, "p1");
    }

    #[test]
    fn missing_name_column_is_validation_error() {
        let content = "username,password\nme,p1\n";
        assert!(matches!(
            import_str(content),
            Err(VaultError::Validation(_))
        ));
    }
}
