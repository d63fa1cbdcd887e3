//! Legacy schema detection.
//!
//! Early databases carried a UNIQUE constraint on `entries.name`, which is
//! incompatible with entries that share a display name. When that schema
//! is detected the file is moved aside and a fresh database is created.

use std::path::Path;

use log::warn;
use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;

/// Suffix appended to a database file with the old schema.
pub const BACKUP_SUFFIX: &str = ".backup_old_schema";

pub fn check_and_migrate(db_path: &Path) -> Result<()> {
    if !db_path.exists() {
        return Ok(());
    }

    let create_sql: Option<String> = {
        let conn = Connection::open(db_path)?;
        conn.query_row(
            "SELECT sql FROM sqlite_master WHERE type='table' AND name='entries'",
            [],
            |row| row.get(0),
        )
        .optional()?
    };

    if let Some(sql) = create_sql {
        if sql.to_uppercase().contains("UNIQUE") {
            let mut backup = db_path.as_os_str().to_owned();
            backup.push(BACKUP_SUFFIX);
            warn!("old database schema detected (UNIQUE on entries.name)");
            warn!("backing up old database to {backup:?}");
            std::fs::rename(db_path, &backup)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn old_schema_is_moved_aside() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("vault.db");
        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute(
                "CREATE TABLE entries (id INTEGER PRIMARY KEY AUTOINCREMENT,
                 category TEXT NOT NULL, name TEXT NOT NULL UNIQUE)",
                [],
            )
            .unwrap();
        }

        check_and_migrate(&db_path).unwrap();
        assert!(!db_path.exists());

        let mut backup = db_path.as_os_str().to_owned();
        backup.push(BACKUP_SUFFIX);
        assert!(Path::new(&backup).exists());
    }

    #[test]
    fn current_schema_is_left_alone() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("vault.db");
        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute(
                "CREATE TABLE entries (id INTEGER PRIMARY KEY AUTOINCREMENT,
                 category TEXT NOT NULL, name TEXT NOT NULL)",
                [],
            )
            .unwrap();
        }

        check_and_migrate(&db_path).unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn missing_database_is_a_no_op() {
        let dir = tempdir().unwrap();
        check_and_migrate(&dir.path().join("nope.db")).unwrap();
    }
}
