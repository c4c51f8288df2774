//! Report statistics repository.
//!
//! Grouped counts for the dashboard. Everything here is computed fresh from
//! the `reports` table; nothing is cached. Unless a method says otherwise,
//! only approved reports are counted.

use chrono::NaiveDate;
use huella_core::report::{ReportState, Sector, Severity};
use huella_core::stats::{HeroCounts, MonthCount, TOP_SECTORS};
use rusqlite::{params, Connection};
use tracing::warn;

use super::decode;
use super::reports::DATE_FORMAT;
use crate::error::Result;
use crate::models::Summary;

const APPROVED: &str = "approved";

/// Repository for statistics queries.
pub struct StatsRepo;

impl StatsRepo {
    /// Headline counts. `this_month` uses the month of `today`.
    pub fn hero(conn: &Connection, today: NaiveDate) -> Result<HeroCounts> {
        let (total, approved, pending, severe, sectors_affected): (i64, i64, i64, i64, i64) = conn
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(state = ?1), 0),
                        COALESCE(SUM(state = ?2), 0),
                        COALESCE(SUM(severity = ?3), 0),
                        COUNT(DISTINCT sector)
                 FROM reports",
                params![
                    ReportState::Approved.as_str(),
                    ReportState::Pending.as_str(),
                    Severity::Severe.as_str()
                ],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )?;

        Ok(HeroCounts {
            total,
            approved,
            pending,
            severe,
            sectors_affected,
            this_month: Self::count_in_month(conn, today)?,
        })
    }

    /// Counts for the landing page.
    pub fn summary(conn: &Connection, today: NaiveDate) -> Result<Summary> {
        let hero = Self::hero(conn, today)?;
        Ok(Summary {
            total: hero.total,
            approved: hero.approved,
            pending: hero.pending,
            this_month: hero.this_month,
        })
    }

    /// Reports of any state whose incident falls in the month of `day`.
    pub fn count_in_month(conn: &Connection, day: NaiveDate) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM reports WHERE strftime('%Y-%m', incident_date) = ?1",
            [day.format("%Y-%m").to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Approved reports per incident month, chronological.
    ///
    /// With `since`, only incidents on or after that date are counted.
    pub fn monthly(conn: &Connection, since: Option<NaiveDate>) -> Result<Vec<MonthCount>> {
        let since = since.map(|d| d.format(DATE_FORMAT).to_string());

        let mut stmt = conn.prepare(
            "SELECT strftime('%Y-%m', incident_date) AS month, COUNT(*)
             FROM reports
             WHERE state = ?1 AND (?2 IS NULL OR incident_date >= ?2)
             GROUP BY month
             ORDER BY month ASC",
        )?;

        let rows = stmt
            .query_map(params![APPROVED, since], |row| {
                Ok((row.get::<_, Option<String>>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let months = rows
            .into_iter()
            .filter_map(|(key, count)| {
                let month = key.as_deref().and_then(|k| MonthCount::from_key(k, count));
                if month.is_none() {
                    warn!("Skipping unparseable incident month {:?}", key);
                }
                month
            })
            .collect();

        Ok(months)
    }

    /// Approved reports per severity.
    pub fn severity_counts(conn: &Connection) -> Result<Vec<(Severity, i64)>> {
        let mut stmt = conn.prepare(
            "SELECT severity, COUNT(*) FROM reports WHERE state = ?1 GROUP BY severity",
        )?;

        let rows = stmt
            .query_map([APPROVED], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let counts = rows
            .into_iter()
            .map(|(s, count)| decode(0, &s, Severity::parse).map(|v| (v, count)))
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(counts)
    }

    /// Sectors by approved report count, highest first.
    ///
    /// Ties go to the sector whose first report was inserted earliest.
    pub fn sector_ranking(conn: &Connection) -> Result<Vec<(Sector, i64)>> {
        let mut stmt = conn.prepare(
            "SELECT sector, COUNT(*) AS total, MIN(id) AS first_id
             FROM reports
             WHERE state = ?1 AND sector IS NOT NULL
             GROUP BY sector
             ORDER BY total DESC, first_id ASC
             LIMIT ?2",
        )?;

        let rows = stmt
            .query_map(params![APPROVED, TOP_SECTORS as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let counts = rows
            .into_iter()
            .map(|(s, count)| decode(0, &s, Sector::parse).map(|v| (v, count)))
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(counts)
    }

    /// Approved reports per hour of day, for reports with a time.
    pub fn hour_counts(conn: &Connection) -> Result<Vec<(u32, i64)>> {
        let mut stmt = conn.prepare(
            "SELECT CAST(substr(incident_time, 1, 2) AS INTEGER) AS hour, COUNT(*)
             FROM reports
             WHERE state = ?1 AND incident_time IS NOT NULL
             GROUP BY hour",
        )?;

        let counts = stmt
            .query_map([APPROVED], |row| {
                Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    /// Approved reports per weekday, numbered 0 (Sunday) to 6.
    pub fn weekday_counts(conn: &Connection) -> Result<Vec<(u32, i64)>> {
        let mut stmt = conn.prepare(
            "SELECT CAST(strftime('%w', incident_date) AS INTEGER) AS weekday, COUNT(*)
             FROM reports
             WHERE state = ?1
             GROUP BY weekday",
        )?;

        let counts = stmt
            .query_map([APPROVED], |row| {
                Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    /// Approved reports with at least one photo.
    pub fn approved_with_photo(conn: &Connection) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(DISTINCT r.id)
             FROM reports r
             JOIN photos p ON p.report_id = r.id
             WHERE r.state = ?1",
            [APPROVED],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
