//! Session token repository.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::parse_datetime;
use crate::error::Result;
use crate::models::SessionRecord;

/// Repository for bearer-token sessions.
pub struct SessionsRepo;

impl SessionsRepo {
    /// Create a new session token with expiry.
    pub fn create(
        conn: &Connection,
        token: &str,
        account_id: i64,
        expires_in: Duration,
    ) -> Result<()> {
        let now = Utc::now();
        let expires_at = now + expires_in;

        conn.execute(
            "INSERT OR REPLACE INTO sessions (token, account_id, created_at, expires_at, last_used_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                token,
                account_id,
                now.to_rfc3339(),
                expires_at.to_rfc3339(),
                now.to_rfc3339()
            ],
        )?;

        Ok(())
    }

    /// Resolve a token to its account ID, refreshing `last_used_at`.
    ///
    /// Expired sessions are deleted and resolve to `None`.
    pub fn validate(conn: &Connection, token: &str) -> Result<Option<i64>> {
        let now = Utc::now();

        let found: Option<(i64, String)> = conn
            .query_row(
                "SELECT account_id, expires_at FROM sessions WHERE token = ?1",
                params![token],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((account_id, expires_at)) = found else {
            return Ok(None);
        };

        let expired = DateTime::parse_from_rfc3339(&expires_at)
            .map(|dt| now > dt)
            .unwrap_or(true);

        if expired {
            conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
            return Ok(None);
        }

        conn.execute(
            "UPDATE sessions SET last_used_at = ?1 WHERE token = ?2",
            params![now.to_rfc3339(), token],
        )?;

        Ok(Some(account_id))
    }

    /// Get a session record.
    pub fn get(conn: &Connection, token: &str) -> Result<Option<SessionRecord>> {
        let record = conn
            .query_row(
                "SELECT token, account_id, created_at, expires_at, last_used_at
                 FROM sessions WHERE token = ?1",
                params![token],
                |row| {
                    Ok(SessionRecord {
                        token: row.get(0)?,
                        account_id: row.get(1)?,
                        created_at: parse_datetime(2, &row.get::<_, String>(2)?)?,
                        expires_at: parse_datetime(3, &row.get::<_, String>(3)?)?,
                        last_used_at: parse_datetime(4, &row.get::<_, String>(4)?)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Invalidate (delete) a session token.
    pub fn invalidate(conn: &Connection, token: &str) -> Result<()> {
        conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(())
    }

    /// Clean up all expired sessions.
    /// Returns the number of sessions deleted.
    pub fn cleanup_expired(conn: &Connection) -> Result<u64> {
        let now = Utc::now().to_rfc3339();
        let deleted = conn.execute("DELETE FROM sessions WHERE expires_at < ?1", params![now])?;
        Ok(deleted as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::run_migrations;

    fn setup_db() -> (Connection, i64) {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO accounts (username, email, password_hash) VALUES ('ana', 'ana@example.com', 'x')",
            [],
        )
        .unwrap();
        let id = conn.last_insert_rowid();
        (conn, id)
    }

    #[test]
    fn test_session_management() {
        let (conn, account_id) = setup_db();
        let token = "test_session_token_12345";

        SessionsRepo::create(&conn, token, account_id, Duration::hours(1)).unwrap();
        assert_eq!(
            SessionsRepo::validate(&conn, token).unwrap(),
            Some(account_id)
        );
        assert!(SessionsRepo::get(&conn, token).unwrap().is_some());

        SessionsRepo::invalidate(&conn, token).unwrap();
        assert_eq!(SessionsRepo::validate(&conn, token).unwrap(), None);
    }

    #[test]
    fn test_session_expiry() {
        let (conn, account_id) = setup_db();
        let token = "expired_token";

        SessionsRepo::create(&conn, token, account_id, Duration::seconds(-1)).unwrap();

        assert_eq!(SessionsRepo::validate(&conn, token).unwrap(), None);
        // Expired sessions are removed on lookup
        assert!(SessionsRepo::get(&conn, token).unwrap().is_none());
    }

    #[test]
    fn test_cleanup_expired() {
        let (conn, account_id) = setup_db();
        SessionsRepo::create(&conn, "old", account_id, Duration::seconds(-10)).unwrap();
        SessionsRepo::create(&conn, "new", account_id, Duration::hours(1)).unwrap();

        assert_eq!(SessionsRepo::cleanup_expired(&conn).unwrap(), 1);
        assert!(SessionsRepo::get(&conn, "new").unwrap().is_some());
    }

    #[test]
    fn test_sessions_cascade_with_account() {
        let (conn, account_id) = setup_db();
        SessionsRepo::create(&conn, "tok", account_id, Duration::hours(1)).unwrap();

        conn.execute("DELETE FROM accounts WHERE id = ?1", [account_id])
            .unwrap();
        assert!(SessionsRepo::get(&conn, "tok").unwrap().is_none());
    }
}
