//! Database schema and migrations.

use rusqlite::Connection;
use tracing::info;

use crate::error::{Result, StorageError};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version > SCHEMA_VERSION {
        return Err(StorageError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current_version, SCHEMA_VERSION
        )));
    }

    if current_version < SCHEMA_VERSION {
        info!(
            "Running migrations from version {} to {}",
            current_version, SCHEMA_VERSION
        );

        if current_version < 1 {
            migrate_v1(conn)?;
        }

        if current_version < 2 {
            migrate_v2(conn)?;
        }

        set_schema_version(conn, SCHEMA_VERSION)?;
        info!("Migrations complete");
    }

    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        [],
    )?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration to version 1: Accounts, profiles and sessions.
fn migrate_v1(conn: &Connection) -> Result<()> {
    info!("Applying migration v1: Accounts and sessions");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE COLLATE NOCASE,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            password_hash TEXT NOT NULL,
            is_superuser INTEGER NOT NULL DEFAULT 0,
            is_staff INTEGER NOT NULL DEFAULT 0,
            date_joined TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    // One profile per account; missing profiles read as role 'user'
    conn.execute(
        "CREATE TABLE IF NOT EXISTS user_profiles (
            user_id INTEGER PRIMARY KEY,
            role TEXT NOT NULL DEFAULT 'user',
            FOREIGN KEY (user_id) REFERENCES accounts(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            account_id INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            expires_at TEXT NOT NULL,
            last_used_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE
        )",
        [],
    )?;

    // Index for cleaning up expired sessions
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions (expires_at)",
        [],
    )?;

    Ok(())
}

/// Migration to version 2: Reports, photos and the moderation log.
fn migrate_v2(conn: &Connection) -> Result<()> {
    info!("Applying migration v2: Reports and moderation");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            incident_date TEXT NOT NULL,
            incident_time TEXT,
            animal_type TEXT NOT NULL,
            aggressor_count INTEGER NOT NULL DEFAULT 1,
            severity TEXT NOT NULL,
            description TEXT NOT NULL,
            address TEXT NOT NULL,
            sector TEXT,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            anonymous INTEGER NOT NULL DEFAULT 0,
            reporter_name TEXT,
            reporter_email TEXT,
            reporter_phone TEXT,
            user_id INTEGER,
            state TEXT NOT NULL DEFAULT 'pending',
            moderator_id INTEGER,
            moderated_at TEXT,
            moderation_comment TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (user_id) REFERENCES accounts(id) ON DELETE SET NULL,
            FOREIGN KEY (moderator_id) REFERENCES accounts(id) ON DELETE SET NULL
        )",
        [],
    )?;

    // Queue ordering and state filters
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_reports_state ON reports (state)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_reports_incident_date ON reports (incident_date DESC, id DESC)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS photos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            report_id INTEGER NOT NULL,
            url TEXT NOT NULL,
            display_order INTEGER NOT NULL DEFAULT 1,
            uploaded_at TEXT NOT NULL DEFAULT (datetime('now')),
            state TEXT NOT NULL DEFAULT 'pending',
            graphic INTEGER NOT NULL DEFAULT 0,
            censored INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (report_id) REFERENCES reports(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_photos_report ON photos (report_id)",
        [],
    )?;

    // Append-only audit trail
    conn.execute(
        "CREATE TABLE IF NOT EXISTS moderation_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            report_id INTEGER NOT NULL,
            moderator_id INTEGER,
            action TEXT NOT NULL,
            reason TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (report_id) REFERENCES reports(id) ON DELETE CASCADE,
            FOREIGN KEY (moderator_id) REFERENCES accounts(id) ON DELETE SET NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_moderation_log_report ON moderation_log (report_id)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Run migrations twice - should not error
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for table in [
            "accounts",
            "user_profiles",
            "sessions",
            "reports",
            "photos",
            "moderation_log",
        ] {
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })
                .unwrap();
            assert_eq!(count, 0, "table {} should start empty", table);
        }
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        set_schema_version(&conn, SCHEMA_VERSION + 1).unwrap();

        let err = run_migrations(&conn).unwrap_err();
        assert!(matches!(err, StorageError::Migration(_)));
    }

    #[test]
    fn test_username_is_case_insensitive_unique() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO accounts (username, email, password_hash) VALUES ('Ana', 'ana@example.com', 'x')",
            [],
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO accounts (username, email, password_hash) VALUES ('ANA', 'other@example.com', 'x')",
            [],
        );
        assert!(dup.is_err());
    }
}
