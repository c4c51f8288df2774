//! Moderation audit trail repository.
//!
//! Entries are never updated. Deletion is a superuser-only escape hatch.

use chrono::{DateTime, Utc};
use huella_core::report::LogAction;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{decode, parse_datetime};
use crate::error::Result;
use crate::models::LogEntry;

const LOG_SELECT: &str = "SELECT l.id, l.report_id, l.moderator_id, a.username, l.action, l.reason, l.created_at
     FROM moderation_log l
     LEFT JOIN accounts a ON a.id = l.moderator_id";

/// Repository for moderation log operations.
pub struct ModerationLogRepo;

impl ModerationLogRepo {
    /// Append an entry.
    pub fn insert(
        conn: &Connection,
        report_id: i64,
        moderator_id: Option<i64>,
        action: LogAction,
        reason: &str,
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        conn.execute(
            "INSERT INTO moderation_log (report_id, moderator_id, action, reason, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                report_id,
                moderator_id,
                action.as_str(),
                reason,
                created_at.to_rfc3339()
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Get an entry by ID.
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<LogEntry>> {
        let sql = format!("{} WHERE l.id = ?1", LOG_SELECT);
        let entry = conn.query_row(&sql, [id], row_to_entry).optional()?;
        Ok(entry)
    }

    /// Entries for a report, in creation order.
    pub fn list_for_report(conn: &Connection, report_id: i64) -> Result<Vec<LogEntry>> {
        let sql = format!(
            "{} WHERE l.report_id = ?1 ORDER BY l.created_at ASC, l.id ASC",
            LOG_SELECT
        );

        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map([report_id], row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Delete an entry.
    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        let deleted = conn.execute("DELETE FROM moderation_log WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<LogEntry> {
    let action: String = row.get(4)?;

    Ok(LogEntry {
        id: row.get(0)?,
        report_id: row.get(1)?,
        moderator_id: row.get(2)?,
        moderator_username: row.get(3)?,
        action: decode(4, &action, LogAction::parse)?,
        reason: row.get(5)?,
        created_at: parse_datetime(6, &row.get::<_, String>(6)?)?,
    })
}
