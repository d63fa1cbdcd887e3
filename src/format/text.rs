//! Free-text import.
//!
//! Two line conventions are supported and auto-detected:
//!
//! * Block format — an entry name on its own line followed by
//!   `key: value` lines, blocks separated by blank lines.
//! * One-line format — `Name // user alice // pass hunter2`, one entry
//!   per line.
//!
//! Keys go through the same alias table as CSV headers.

use crate::store::{Entry, EntryDetails};

use super::csv::alias_to_field;

pub fn import_str(content: &str) -> Vec<Entry> {
    let first_line = content
        .lines()
        .take(5)
        .find(|line| !line.trim().is_empty());
    match first_line {
        Some(line) if line.contains("//") => parse_double_slash(content),
        _ => parse_key_colon_value(content),
    }
}

fn assemble(name: &str, fields: Vec<(&'static str, String)>) -> Option<Entry> {
    if fields.is_empty() {
        return None;
    }
    let mut entry = Entry::new("", name, EntryDetails::default());
    for (field, value) in fields {
        match field {
            "category" => entry.category = value,
            "username" => entry.details.username = value,
            "email" => entry.details.email = value,
            "password" => entry.details.password = value,
            "url" => entry.details.url = value,
            "notes" => entry.details.notes = value,
            "totp" => entry.details.totp_secret = Some(value),
            // a "name" alias inside a block never overrides the title line
            _ => {}
        }
    }
    Some(entry)
}

fn parse_key_colon_value(content: &str) -> Vec<Entry> {
    let mut entries = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    // Blocks are separated by blank lines. Grouping trimmed lines keeps
    // CRLF files and lines of stray whitespace behaving like plain LF.
    for line in content.lines().map(str::trim) {
        if line.is_empty() {
            flush_block(&block, &mut entries);
            block.clear();
        } else {
            block.push(line);
        }
    }
    flush_block(&block, &mut entries);
    entries
}

fn flush_block(block: &[&str], entries: &mut Vec<Entry>) {
    let Some((name, rest)) = block.split_first() else {
        return;
    };

    let fields: Vec<(&'static str, String)> = rest
        .iter()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let field = alias_to_field(key)?;
            Some((field, value.trim().to_string()))
        })
        .collect();

    if let Some(entry) = assemble(name, fields) {
        entries.push(entry);
    }
}

fn parse_double_slash(content: &str) -> Vec<Entry> {
    let mut entries = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let mut parts = line.split("//").map(str::trim);
        let Some(name) = parts.next().filter(|n| !n.is_empty()) else {
            continue;
        };

        let fields: Vec<(&'static str, String)> = parts
            .filter_map(|part| {
                let (key, value) = match part.split_once(' ') {
                    Some((k, v)) => (k, v.trim().to_string()),
                    None => (part, String::new()),
                };
                Some((alias_to_field(key)?, value))
            })
            .collect();

        if let Some(entry) = assemble(name, fields) {
            entries.push(entry);
        }
    }
    entries
}
