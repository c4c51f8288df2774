//! Database repositories for each table.

pub mod accounts;
pub mod moderation_log;
pub mod photos;
pub mod reports;
pub mod sessions;
pub mod stats;

pub use accounts::AccountsRepo;
pub use moderation_log::ModerationLogRepo;
pub use photos::PhotosRepo;
pub use reports::{ReportsRepo, DATE_FORMAT, TIME_FORMAT};
pub use sessions::SessionsRepo;
pub use stats::StatsRepo;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;

/// Parse a stored timestamp (RFC 3339, or SQLite's `datetime('now')` format).
///
/// An unparseable value fails the row like any other conversion error.
pub(crate) fn parse_datetime(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|dt| dt.and_utc())
        })
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Decode a text column through a `parse` function, failing the row on
/// unknown values.
pub(crate) fn decode<T>(
    idx: usize,
    value: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    parse(value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unexpected value '{}'", value).into(),
        )
    })
}

/// Build `?, ?, ?` for an `IN (...)` clause.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}
