//! Reports repository.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use huella_core::moderation::{Effect, QueueFilter, QUEUE_PAGE_SIZE};
use huella_core::pagination::Page;
use huella_core::report::{AnimalType, Location, ReportState, Reporter, Sector, Severity};
use huella_core::validation::ValidReport;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::warn;

use super::{decode, parse_datetime, placeholders};
use crate::error::Result;
use crate::models::{MapPin, QueuePage, Report, StateCounts};

/// Storage format for incident dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Storage format for incident times.
pub const TIME_FORMAT: &str = "%H:%M:%S";

const REPORT_COLUMNS: &str = "r.id, r.title, r.incident_date, r.incident_time, r.animal_type,
        r.aggressor_count, r.severity, r.description, r.address, r.sector,
        r.latitude, r.longitude, r.anonymous, r.reporter_name, r.reporter_email,
        r.reporter_phone, r.user_id, u.username, r.state, r.moderator_id, m.username,
        r.moderated_at, r.moderation_comment, r.created_at, r.updated_at";

const REPORT_FROM: &str = "FROM reports r
     LEFT JOIN accounts u ON u.id = r.user_id
     LEFT JOIN accounts m ON m.id = r.moderator_id";

/// Lowest display order wins; ties go to the newest upload.
const PRIMARY_PHOTO: &str = "(SELECT p.url FROM photos p WHERE p.report_id = r.id
      ORDER BY p.display_order ASC, p.uploaded_at DESC, p.id DESC LIMIT 1)";

/// Repository for report operations.
pub struct ReportsRepo;

impl ReportsRepo {
    /// Insert a validated report in the `pending` state.
    pub fn insert(conn: &Connection, report: &ValidReport, user_id: Option<i64>) -> Result<i64> {
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO reports (title, incident_date, incident_time, animal_type, aggressor_count,
                                  severity, description, address, sector, latitude, longitude,
                                  anonymous, reporter_name, reporter_email, reporter_phone,
                                  user_id, state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
            params![
                report.title,
                report.incident_date.format(DATE_FORMAT).to_string(),
                report
                    .incident_time
                    .map(|t| t.format(TIME_FORMAT).to_string()),
                report.animal_type.as_str(),
                report.aggressor_count,
                report.severity.as_str(),
                report.description,
                report.address,
                report.sector.map(|s| s.as_str()),
                report.location.latitude,
                report.location.longitude,
                report.reporter.is_anonymous() as i32,
                report.reporter.name(),
                report.reporter.email(),
                report.reporter.phone(),
                user_id,
                ReportState::Pending.as_str(),
                now,
                now,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Get a report by ID.
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Report>> {
        let sql = format!("SELECT {} {} WHERE r.id = ?1", REPORT_COLUMNS, REPORT_FROM);
        let report = conn.query_row(&sql, [id], row_to_report).optional()?;
        Ok(report)
    }

    /// Check whether a report exists.
    pub fn exists(conn: &Connection, id: i64) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row("SELECT id FROM reports WHERE id = ?1", [id], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    /// One page of the moderation queue, newest incidents first.
    pub fn queue(
        conn: &Connection,
        filter: &QueueFilter,
        requested_page: Option<&str>,
    ) -> Result<QueuePage> {
        let mut where_sql = String::from(" WHERE 1=1");
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(state) = filter.state {
            where_sql.push_str(" AND r.state = ?");
            params_vec.push(Box::new(state.as_str()));
        }

        if let Some(severity) = filter.severity {
            where_sql.push_str(" AND r.severity = ?");
            params_vec.push(Box::new(severity.as_str()));
        }

        if let Some(animal) = filter.animal_type {
            where_sql.push_str(" AND r.animal_type = ?");
            params_vec.push(Box::new(animal.as_str()));
        }

        if let Some(anonymous) = filter.anonymous {
            where_sql.push_str(" AND r.anonymous = ?");
            params_vec.push(Box::new(anonymous as i32));
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let filtered_total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM reports r{}", where_sql),
            params_refs.as_slice(),
            |row| row.get(0),
        )?;

        let page = Page::resolve(requested_page, filtered_total as usize, QUEUE_PAGE_SIZE);

        let sql = format!(
            "SELECT {} {}{} ORDER BY r.incident_date DESC, r.id DESC LIMIT {} OFFSET {}",
            REPORT_COLUMNS,
            REPORT_FROM,
            where_sql,
            page.per_page,
            page.offset()
        );

        let mut stmt = conn.prepare(&sql)?;
        let reports = stmt
            .query_map(params_refs.as_slice(), row_to_report)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(QueuePage {
            reports,
            page,
            counts: Self::count_by_state(conn)?,
            filtered_total,
        })
    }

    /// Count reports per moderation state.
    pub fn count_by_state(conn: &Connection) -> Result<StateCounts> {
        let mut stmt = conn.prepare("SELECT state, COUNT(*) FROM reports GROUP BY state")?;
        let rows: Vec<(String, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut counts = StateCounts::default();
        for (state, count) in rows {
            match ReportState::parse(&state) {
                Some(ReportState::Pending) => counts.pending += count,
                Some(ReportState::Approved) => counts.approved += count,
                Some(ReportState::Rejected) => counts.rejected += count,
                None => warn!("Report state '{}' is not recognized", state),
            }
            counts.all += count;
        }

        Ok(counts)
    }

    /// Approved reports with their primary photo, newest incidents first.
    ///
    /// Rows that fail to decode are skipped.
    pub fn approved_for_map(conn: &Connection) -> Result<Vec<MapPin>> {
        let sql = format!(
            "SELECT {}, {} {} WHERE r.state = ?1 ORDER BY r.incident_date DESC, r.id DESC",
            REPORT_COLUMNS, PRIMARY_PHOTO, REPORT_FROM
        );

        let mut stmt = conn.prepare(&sql)?;
        let pins = stmt
            .query_map([ReportState::Approved.as_str()], |row| {
                Ok(MapPin {
                    report: row_to_report(row)?,
                    photo_url: row.get(25)?,
                })
            })?
            .filter_map(|r| match r {
                Ok(pin) => Some(pin),
                Err(e) => {
                    warn!("Skipping report that could not be decoded: {}", e);
                    None
                }
            })
            .collect();

        Ok(pins)
    }

    /// All reports, oldest first.
    pub fn get_all(conn: &Connection) -> Result<Vec<Report>> {
        let sql = format!("SELECT {} {} ORDER BY r.id ASC", REPORT_COLUMNS, REPORT_FROM);
        let mut stmt = conn.prepare(&sql)?;
        let reports = stmt
            .query_map([], row_to_report)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(reports)
    }

    /// Write a moderation effect to the given reports.
    ///
    /// Returns the number of reports updated.
    pub fn apply_effect(
        conn: &Connection,
        ids: &[i64],
        effect: &Effect,
        moderator_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let now = now.to_rfc3339();
        let mut sets = vec!["updated_at = ?"];
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(now.clone())];

        if let Some(state) = effect.state {
            sets.push("state = ?");
            params_vec.push(Box::new(state.as_str()));
        }

        if effect.stamp_moderator {
            sets.push("moderator_id = ?");
            params_vec.push(Box::new(moderator_id));
            sets.push("moderated_at = ?");
            params_vec.push(Box::new(now));
        }

        if let Some(ref comment) = effect.comment {
            sets.push("moderation_comment = ?");
            params_vec.push(Box::new(comment.clone()));
        }

        for id in ids {
            params_vec.push(Box::new(*id));
        }

        let sql = format!(
            "UPDATE reports SET {} WHERE id IN ({})",
            sets.join(", "),
            placeholders(ids.len())
        );

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let updated = conn.execute(&sql, params_refs.as_slice())?;

        Ok(updated)
    }

    /// Delete a report. Photos and log entries cascade.
    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        let deleted = conn.execute("DELETE FROM reports WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    /// Number of reports submitted by an account.
    pub fn count_submitted_by(conn: &Connection, account_id: i64) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM reports WHERE user_id = ?1",
            [account_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Number of reports last moderated by an account.
    pub fn count_moderated_by(conn: &Connection, account_id: i64) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM reports WHERE moderator_id = ?1",
            [account_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// Map a row selected with `REPORT_COLUMNS` to a [`Report`].
fn row_to_report(row: &Row<'_>) -> rusqlite::Result<Report> {
    let incident_date: String = row.get(2)?;
    let incident_time: Option<String> = row.get(3)?;
    let animal_type: String = row.get(4)?;
    let severity: String = row.get(6)?;
    let sector: Option<String> = row.get(9)?;
    let latitude: f64 = row.get(10)?;
    let longitude: f64 = row.get(11)?;
    let state: String = row.get(18)?;

    let location = Location::new(latitude, longitude).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            10,
            Type::Real,
            format!("coordinates out of range: {}, {}", latitude, longitude).into(),
        )
    })?;

    Ok(Report {
        id: row.get(0)?,
        title: row.get(1)?,
        incident_date: decode(2, &incident_date, |s| {
            NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
        })?,
        incident_time: incident_time
            .map(|t| decode(3, &t, |s| NaiveTime::parse_from_str(s, TIME_FORMAT).ok()))
            .transpose()?,
        animal_type: decode(4, &animal_type, AnimalType::parse)?,
        aggressor_count: row.get(5)?,
        severity: decode(6, &severity, Severity::parse)?,
        description: row.get(7)?,
        address: row.get(8)?,
        sector: sector.map(|s| decode(9, &s, Sector::parse)).transpose()?,
        location,
        reporter: Reporter::new(
            row.get::<_, i32>(12)? != 0,
            row.get(13)?,
            row.get(14)?,
            row.get(15)?,
        ),
        user_id: row.get(16)?,
        username: row.get(17)?,
        state: decode(18, &state, ReportState::parse)?,
        moderator_id: row.get(19)?,
        moderator_username: row.get(20)?,
        moderated_at: row
            .get::<_, Option<String>>(21)?
            .map(|s| parse_datetime(21, &s))
            .transpose()?,
        moderation_comment: row.get(22)?,
        created_at: parse_datetime(23, &row.get::<_, String>(23)?)?,
        updated_at: parse_datetime(24, &row.get::<_, String>(24)?)?,
    })
}
