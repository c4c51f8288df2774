//! Photos repository.

use std::collections::HashMap;

use chrono::Utc;
use huella_core::report::PhotoState;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{decode, parse_datetime, placeholders};
use crate::error::Result;
use crate::models::{NewPhoto, Photo, PhotoUpdate};

const PHOTO_COLUMNS: &str =
    "id, report_id, url, display_order, uploaded_at, state, graphic, censored";

/// Repository for photo operations.
pub struct PhotosRepo;

impl PhotosRepo {
    /// Attach a photo to a report.
    pub fn insert(conn: &Connection, report_id: i64, photo: &NewPhoto) -> Result<i64> {
        conn.execute(
            "INSERT INTO photos (report_id, url, display_order, uploaded_at, state)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                report_id,
                photo.url,
                photo.display_order,
                Utc::now().to_rfc3339(),
                PhotoState::Pending.as_str(),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Get a photo by ID.
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Photo>> {
        let sql = format!("SELECT {} FROM photos WHERE id = ?1", PHOTO_COLUMNS);
        let photo = conn.query_row(&sql, [id], row_to_photo).optional()?;
        Ok(photo)
    }

    /// Photos of a report, primary photo first.
    pub fn list_for_report(conn: &Connection, report_id: i64) -> Result<Vec<Photo>> {
        let sql = format!(
            "SELECT {} FROM photos WHERE report_id = ?1
             ORDER BY display_order ASC, uploaded_at DESC, id DESC",
            PHOTO_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let photos = stmt
            .query_map([report_id], row_to_photo)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(photos)
    }

    /// Photo counts for several reports in one query.
    ///
    /// Reports without photos are absent from the map.
    pub fn count_for_reports(
        conn: &Connection,
        report_ids: &[i64],
    ) -> Result<HashMap<i64, usize>> {
        if report_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT report_id, COUNT(*) FROM photos WHERE report_id IN ({}) GROUP BY report_id",
            placeholders(report_ids.len())
        );

        let mut stmt = conn.prepare(&sql)?;
        let counts = stmt
            .query_map(rusqlite::params_from_iter(report_ids), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<std::result::Result<HashMap<_, _>, _>>()?;

        Ok(counts)
    }

    /// Apply moderator changes to a photo.
    ///
    /// Returns `false` if the photo does not exist.
    pub fn update(conn: &Connection, id: i64, update: &PhotoUpdate) -> Result<bool> {
        let updated = conn.execute(
            "UPDATE photos
             SET state = COALESCE(?1, state),
                 graphic = COALESCE(?2, graphic),
                 censored = COALESCE(?3, censored)
             WHERE id = ?4",
            params![
                update.state.map(|s| s.as_str()),
                update.graphic.map(|b| b as i32),
                update.censored.map(|b| b as i32),
                id,
            ],
        )?;
        Ok(updated > 0)
    }
}

fn row_to_photo(row: &Row<'_>) -> rusqlite::Result<Photo> {
    let state: String = row.get(5)?;

    Ok(Photo {
        id: row.get(0)?,
        report_id: row.get(1)?,
        url: row.get(2)?,
        display_order: row.get(3)?,
        uploaded_at: parse_datetime(4, &row.get::<_, String>(4)?)?,
        state: decode(5, &state, PhotoState::parse)?,
        graphic: row.get::<_, i32>(6)? != 0,
        censored: row.get::<_, i32>(7)? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::ReportsRepo;
    use crate::schema::run_migrations;
    use crate::test_support::sample_report;

    fn setup_db() -> (Connection, i64) {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        let report_id = ReportsRepo::insert(&conn, &sample_report(), None).unwrap();
        (conn, report_id)
    }

    fn new_photo(url: &str, order: i32) -> NewPhoto {
        NewPhoto {
            url: url.to_string(),
            display_order: order,
        }
    }

    #[test]
    fn test_insert_and_list_in_display_order() {
        let (conn, report_id) = setup_db();
        PhotosRepo::insert(&conn, report_id, &new_photo("/media/2.jpg", 2)).unwrap();
        PhotosRepo::insert(&conn, report_id, &new_photo("/media/1.jpg", 1)).unwrap();

        let photos = PhotosRepo::list_for_report(&conn, report_id).unwrap();
        let urls: Vec<&str> = photos.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["/media/1.jpg", "/media/2.jpg"]);
        assert_eq!(photos[0].state, PhotoState::Pending);
        assert!(!photos[0].graphic);
    }

    #[test]
    fn test_update_only_given_fields() {
        let (conn, report_id) = setup_db();
        let id = PhotosRepo::insert(&conn, report_id, &new_photo("/media/1.jpg", 1)).unwrap();

        let changed = PhotosRepo::update(
            &conn,
            id,
            &PhotoUpdate {
                graphic: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(changed);

        PhotosRepo::update(
            &conn,
            id,
            &PhotoUpdate {
                state: Some(PhotoState::Approved),
                ..Default::default()
            },
        )
        .unwrap();

        let photo = PhotosRepo::get_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(photo.state, PhotoState::Approved);
        assert!(photo.graphic);
        assert!(!photo.censored);
    }

    #[test]
    fn test_update_missing_photo() {
        let (conn, _) = setup_db();
        assert!(!PhotosRepo::update(&conn, 77, &PhotoUpdate::default()).unwrap());
    }

    #[test]
    fn test_count_for_reports() {
        let (conn, first) = setup_db();
        let second = ReportsRepo::insert(&conn, &sample_report(), None).unwrap();
        let empty = ReportsRepo::insert(&conn, &sample_report(), None).unwrap();
        PhotosRepo::insert(&conn, first, &new_photo("/media/1.jpg", 1)).unwrap();
        PhotosRepo::insert(&conn, first, &new_photo("/media/2.jpg", 2)).unwrap();
        PhotosRepo::insert(&conn, second, &new_photo("/media/3.jpg", 1)).unwrap();

        let counts = PhotosRepo::count_for_reports(&conn, &[first, second, empty]).unwrap();
        assert_eq!(counts.get(&first), Some(&2));
        assert_eq!(counts.get(&second), Some(&1));
        assert_eq!(counts.get(&empty), None);

        // Only the requested reports are counted
        let counts = PhotosRepo::count_for_reports(&conn, &[second]).unwrap();
        assert_eq!(counts.len(), 1);
        assert!(PhotosRepo::count_for_reports(&conn, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_foreign_key_requires_report() {
        let (conn, _) = setup_db();
        assert!(PhotosRepo::insert(&conn, 999, &new_photo("/media/x.jpg", 1)).is_err());
    }
}
