//! Submission validation.
//!
//! A submission arrives as a [`RawSubmission`] (every field as the client sent
//! it) plus a batch of [`PhotoUpload`] descriptors. Photos are checked first
//! with [`validate_photos`]; any problem there rejects the submission before
//! the form itself is looked at. [`validate_submission`] then either produces
//! a [`ValidReport`] ready to persist, or a [`ValidationErrors`] map with every
//! field-level problem found.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::report::{AnimalType, Location, Reporter, Sector, Severity};

/// Minimum description length, in characters, after trimming.
pub const MIN_DESCRIPTION_CHARS: usize = 50;

/// Maximum number of photos per report.
pub const MAX_PHOTOS: usize = 5;

/// Maximum size of a single photo (5MB).
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_ADDRESS_CHARS: usize = 300;
pub const MAX_PHONE_CHARS: usize = 20;

/// Allowed range for the number of aggressor animals.
pub const AGGRESSOR_RANGE: std::ops::RangeInclusive<i32> = 1..=20;

const LOCATION_REQUIRED: &str = "Select a location on the map.";

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid"));

/// Per-field validation errors.
///
/// Field names match the submission form field names. Problems that concern
/// the location as a whole are filed under `"location"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Error)]
#[error("submission has {} invalid field(s)", .fields.len())]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error for a field. A field can collect several messages.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Messages recorded for a field (empty if none).
    pub fn get(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.fields
    }
}

/// A submission as received, before any parsing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSubmission {
    pub title: Option<String>,
    pub incident_date: Option<String>,
    pub incident_time: Option<String>,
    pub animal_type: Option<String>,
    pub aggressor_count: Option<String>,
    pub severity: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub sector: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub reporter_name: Option<String>,
    pub reporter_email: Option<String>,
    pub reporter_phone: Option<String>,
    #[serde(default)]
    pub anonymous: bool,
}

impl RawSubmission {
    /// Set a field from a form value by its form name.
    ///
    /// Returns `false` for unknown field names.
    pub fn set_field(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "title" => &mut self.title,
            "incident_date" => &mut self.incident_date,
            "incident_time" => &mut self.incident_time,
            "animal_type" => &mut self.animal_type,
            "aggressor_count" => &mut self.aggressor_count,
            "severity" => &mut self.severity,
            "description" => &mut self.description,
            "address" => &mut self.address,
            "sector" => &mut self.sector,
            "latitude" => &mut self.latitude,
            "longitude" => &mut self.longitude,
            "reporter_name" => &mut self.reporter_name,
            "reporter_email" => &mut self.reporter_email,
            "reporter_phone" => &mut self.reporter_phone,
            "anonymous" => {
                self.anonymous = parse_checkbox(&value);
                return true;
            }
            _ => return false,
        };
        *slot = Some(value);
        true
    }
}

/// Interpret an HTML checkbox value.
pub fn parse_checkbox(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "on" | "true" | "1" | "yes"
    )
}

/// Metadata of an uploaded photo, as declared by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: String,
    pub size: usize,
}

/// Check a photo batch. Returns one message per violated rule and file.
///
/// An empty result means the batch is acceptable.
pub fn validate_photos(photos: &[PhotoUpload]) -> Vec<String> {
    let mut errors = Vec::new();

    if photos.len() > MAX_PHOTOS {
        errors.push(format!("At most {} photos are allowed.", MAX_PHOTOS));
    }

    for photo in photos {
        if photo.size > MAX_PHOTO_BYTES {
            errors.push(format!("{} exceeds the 5MB limit.", photo.file_name));
        }
        if !photo.content_type.starts_with("image/") {
            errors.push(format!("{} is not a valid image.", photo.file_name));
        }
    }

    errors
}

/// A fully validated submission.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidReport {
    pub title: String,
    pub incident_date: NaiveDate,
    pub incident_time: Option<NaiveTime>,
    pub animal_type: AnimalType,
    pub aggressor_count: i32,
    pub severity: Severity,
    pub description: String,
    pub address: String,
    pub sector: Option<Sector>,
    pub location: Location,
    pub reporter: Reporter,
}

/// Validate a submission, collecting every field error.
pub fn validate_submission(raw: &RawSubmission) -> Result<ValidReport, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let title = required_text(&mut errors, "title", raw.title.as_deref(), MAX_TITLE_CHARS);
    let address = required_text(
        &mut errors,
        "address",
        raw.address.as_deref(),
        MAX_ADDRESS_CHARS,
    );

    let incident_date = match trimmed(raw.incident_date.as_deref()) {
        None => {
            errors.add("incident_date", "This field is required.");
            None
        }
        Some(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                errors.add("incident_date", "Enter a valid date (YYYY-MM-DD).");
                None
            }
        },
    };

    let incident_time = match trimmed(raw.incident_time.as_deref()) {
        None => None,
        Some(s) => match parse_time(s) {
            Some(time) => Some(time),
            None => {
                errors.add("incident_time", "Enter a valid time (HH:MM).");
                None
            }
        },
    };

    let animal_type = parse_choice(
        &mut errors,
        "animal_type",
        raw.animal_type.as_deref(),
        AnimalType::parse,
    );
    let severity = parse_choice(
        &mut errors,
        "severity",
        raw.severity.as_deref(),
        Severity::parse,
    );

    let sector = match trimmed(raw.sector.as_deref()) {
        None => None,
        Some(s) => match Sector::parse(s) {
            Some(sector) => Some(sector),
            None => {
                errors.add("sector", format!("'{}' is not a known sector.", s));
                None
            }
        },
    };

    let aggressor_count = match trimmed(raw.aggressor_count.as_deref()) {
        None => *AGGRESSOR_RANGE.start(),
        Some(s) => match s.parse::<i32>() {
            Ok(n) if AGGRESSOR_RANGE.contains(&n) => n,
            _ => {
                errors.add(
                    "aggressor_count",
                    format!(
                        "Enter a whole number between {} and {}.",
                        AGGRESSOR_RANGE.start(),
                        AGGRESSOR_RANGE.end()
                    ),
                );
                *AGGRESSOR_RANGE.start()
            }
        },
    };

    let description = raw.description.as_deref().unwrap_or("").trim();
    if description.chars().count() < MIN_DESCRIPTION_CHARS {
        errors.add(
            "description",
            format!(
                "The description must be at least {} characters long.",
                MIN_DESCRIPTION_CHARS
            ),
        );
    }

    let latitude = parse_coordinate(&mut errors, "latitude", raw.latitude.as_deref(), 90.0);
    let longitude = parse_coordinate(&mut errors, "longitude", raw.longitude.as_deref(), 180.0);
    let location = match (latitude, longitude) {
        (Some(lat), Some(lon)) => match Location::new(lat, lon) {
            Some(location) if location.is_unset() => {
                errors.add("location", "Select a valid location on the map.");
                None
            }
            other => other,
        },
        _ => None,
    };

    if !raw.anonymous {
        if trimmed(raw.reporter_name.as_deref()).is_none() {
            errors.add(
                "reporter_name",
                "Your name is required unless the report is anonymous.",
            );
        }
        match trimmed(raw.reporter_email.as_deref()) {
            None => errors.add(
                "reporter_email",
                "Your email is required unless the report is anonymous.",
            ),
            Some(email) if !EMAIL_RE.is_match(email) => {
                errors.add("reporter_email", "Enter a valid email address.")
            }
            Some(_) => {}
        }
        if let Some(phone) = trimmed(raw.reporter_phone.as_deref()) {
            if phone.chars().count() > MAX_PHONE_CHARS {
                errors.add(
                    "reporter_phone",
                    format!("Use at most {} characters.", MAX_PHONE_CHARS),
                );
            }
        }
    }

    match (
        errors.is_empty(),
        title,
        address,
        incident_date,
        animal_type,
        severity,
        location,
    ) {
        (true, Some(title), Some(address), Some(date), Some(animal), Some(severity), Some(location)) => {
            Ok(ValidReport {
                title,
                incident_date: date,
                incident_time,
                animal_type: animal,
                aggressor_count,
                severity,
                description: description.to_string(),
                address,
                sector,
                location,
                reporter: Reporter::new(
                    raw.anonymous,
                    raw.reporter_name.clone(),
                    raw.reporter_email.clone(),
                    raw.reporter_phone.clone(),
                ),
            })
        }
        _ => Err(errors),
    }
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn required_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
    max_chars: usize,
) -> Option<String> {
    match trimmed(value) {
        None => {
            errors.add(field, "This field is required.");
            None
        }
        Some(v) if v.chars().count() > max_chars => {
            errors.add(field, format!("Use at most {} characters.", max_chars));
            None
        }
        Some(v) => Some(v.to_string()),
    }
}

fn parse_choice<T>(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
    parse: fn(&str) -> Option<T>,
) -> Option<T> {
    match trimmed(value) {
        None => {
            errors.add(field, "This field is required.");
            None
        }
        Some(v) => {
            let parsed = parse(v);
            if parsed.is_none() {
                errors.add(field, format!("'{}' is not a valid choice.", v));
            }
            parsed
        }
    }
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

fn parse_coordinate(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
    bound: f64,
) -> Option<f64> {
    let Some(raw) = trimmed(value) else {
        errors.add(field, LOCATION_REQUIRED);
        return None;
    };

    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && (-bound..=bound).contains(&v) => Some(v),
        Ok(_) => {
            errors.add(
                field,
                format!("Must be between -{} and {}.", bound, bound),
            );
            None
        }
        Err(_) => {
            errors.add(field, "Enter a valid number.");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_raw() -> RawSubmission {
        RawSubmission {
            title: Some("Dog attack near Parque Saval".to_string()),
            incident_date: Some("2025-03-14".to_string()),
            incident_time: Some("07:15".to_string()),
            animal_type: Some("dog".to_string()),
            aggressor_count: Some("3".to_string()),
            severity: Some("moderate".to_string()),
            description: Some("a".repeat(MIN_DESCRIPTION_CHARS)),
            address: Some("Av. Pedro de Valdivia 1500".to_string()),
            sector: Some("parque_saval".to_string()),
            latitude: Some("-39.814287".to_string()),
            longitude: Some("-73.245899".to_string()),
            reporter_name: Some("Juan Pérez".to_string()),
            reporter_email: Some("juan@example.com".to_string()),
            reporter_phone: Some("+56 9 1234 5678".to_string()),
            anonymous: false,
        }
    }

    fn photo(name: &str, content_type: &str, size: usize) -> PhotoUpload {
        PhotoUpload {
            file_name: name.to_string(),
            content_type: content_type.to_string(),
            size,
        }
    }

    #[test]
    fn test_valid_submission() {
        let report = validate_submission(&valid_raw()).unwrap();

        assert_eq!(report.animal_type, AnimalType::Dog);
        assert_eq!(report.severity, Severity::Moderate);
        assert_eq!(report.sector, Some(Sector::ParqueSaval));
        assert_eq!(report.aggressor_count, 3);
        assert_eq!(
            report.incident_time,
            Some(NaiveTime::from_hms_opt(7, 15, 0).unwrap())
        );
        assert_eq!(report.reporter.name(), Some("Juan Pérez"));
    }

    #[test]
    fn test_description_boundary() {
        let mut raw = valid_raw();
        raw.description = Some("x".repeat(MIN_DESCRIPTION_CHARS - 1));
        let errors = validate_submission(&raw).unwrap_err();
        assert!(errors.has("description"));

        raw.description = Some("x".repeat(MIN_DESCRIPTION_CHARS));
        assert!(validate_submission(&raw).is_ok());
    }

    #[test]
    fn test_description_is_trimmed_before_counting() {
        let mut raw = valid_raw();
        raw.description = Some(format!("   {}   ", "x".repeat(MIN_DESCRIPTION_CHARS - 1)));
        assert!(validate_submission(&raw).unwrap_err().has("description"));
    }

    #[test]
    fn test_description_counts_characters_not_bytes() {
        let mut raw = valid_raw();
        raw.description = Some("ñ".repeat(MIN_DESCRIPTION_CHARS));
        assert!(validate_submission(&raw).is_ok());
    }

    #[test]
    fn test_missing_coordinates() {
        let mut raw = valid_raw();
        raw.latitude = None;
        raw.longitude = Some("  ".to_string());

        let errors = validate_submission(&raw).unwrap_err();
        assert_eq!(errors.get("latitude"), [LOCATION_REQUIRED.to_string()]);
        assert_eq!(errors.get("longitude"), [LOCATION_REQUIRED.to_string()]);
    }

    #[test]
    fn test_zero_zero_is_rejected() {
        let mut raw = valid_raw();
        raw.latitude = Some("0".to_string());
        raw.longitude = Some("0.0".to_string());

        let errors = validate_submission(&raw).unwrap_err();
        assert!(errors.has("location"));
        assert!(!errors.has("latitude"));
    }

    #[test]
    fn test_single_zero_coordinate_is_accepted() {
        let mut raw = valid_raw();
        raw.latitude = Some("0".to_string());
        assert!(validate_submission(&raw).is_ok());
    }

    #[test]
    fn test_out_of_range_coordinates() {
        let mut raw = valid_raw();
        raw.latitude = Some("91".to_string());
        raw.longitude = Some("abc".to_string());

        let errors = validate_submission(&raw).unwrap_err();
        assert!(errors.has("latitude"));
        assert_eq!(errors.get("longitude"), ["Enter a valid number.".to_string()]);
    }

    #[test]
    fn test_contact_required_when_not_anonymous() {
        let mut raw = valid_raw();
        raw.reporter_name = Some("   ".to_string());
        raw.reporter_email = None;

        let errors = validate_submission(&raw).unwrap_err();
        assert!(errors.has("reporter_name"));
        assert!(errors.has("reporter_email"));
    }

    #[test]
    fn test_invalid_email() {
        let mut raw = valid_raw();
        raw.reporter_email = Some("not-an-email".to_string());
        assert!(validate_submission(&raw).unwrap_err().has("reporter_email"));
    }

    #[test]
    fn test_anonymous_submission_clears_contact_fields() {
        let mut raw = valid_raw();
        raw.anonymous = true;

        let report = validate_submission(&raw).unwrap();
        assert!(report.reporter.is_anonymous());
        assert_eq!(report.reporter.name(), None);
        assert_eq!(report.reporter.email(), None);
        assert_eq!(report.reporter.phone(), None);
    }

    #[test]
    fn test_anonymous_submission_needs_no_contact() {
        let mut raw = valid_raw();
        raw.anonymous = true;
        raw.reporter_name = None;
        raw.reporter_email = Some("garbage".to_string());
        assert!(validate_submission(&raw).is_ok());
    }

    #[test]
    fn test_aggressor_count_defaults_and_bounds() {
        let mut raw = valid_raw();
        raw.aggressor_count = None;
        assert_eq!(validate_submission(&raw).unwrap().aggressor_count, 1);

        raw.aggressor_count = Some("21".to_string());
        assert!(validate_submission(&raw).unwrap_err().has("aggressor_count"));

        raw.aggressor_count = Some("0".to_string());
        assert!(validate_submission(&raw).unwrap_err().has("aggressor_count"));
    }

    #[test]
    fn test_optional_sector_and_time() {
        let mut raw = valid_raw();
        raw.sector = Some(String::new());
        raw.incident_time = None;

        let report = validate_submission(&raw).unwrap();
        assert_eq!(report.sector, None);
        assert_eq!(report.incident_time, None);

        raw.sector = Some("atlantis".to_string());
        assert!(validate_submission(&raw).unwrap_err().has("sector"));
    }

    #[test]
    fn test_errors_are_all_collected() {
        let errors = validate_submission(&RawSubmission::default()).unwrap_err();

        for field in [
            "title",
            "incident_date",
            "animal_type",
            "severity",
            "description",
            "address",
            "latitude",
            "longitude",
            "reporter_name",
            "reporter_email",
        ] {
            assert!(errors.has(field), "expected an error for {}", field);
        }
    }

    #[test]
    fn test_set_field() {
        let mut raw = RawSubmission::default();
        assert!(raw.set_field("title", "Hello".to_string()));
        assert!(raw.set_field("anonymous", "on".to_string()));
        assert!(!raw.set_field("unknown", "x".to_string()));

        assert_eq!(raw.title.as_deref(), Some("Hello"));
        assert!(raw.anonymous);
    }

    #[test]
    fn test_photo_count_limit() {
        let five: Vec<_> = (0..5)
            .map(|i| photo(&format!("p{}.jpg", i), "image/jpeg", 1024))
            .collect();
        assert!(validate_photos(&five).is_empty());

        let six: Vec<_> = (0..6)
            .map(|i| photo(&format!("p{}.jpg", i), "image/jpeg", 1024))
            .collect();
        assert_eq!(
            validate_photos(&six),
            vec!["At most 5 photos are allowed.".to_string()]
        );
    }

    #[test]
    fn test_photo_errors_are_collected_per_file() {
        let errors = validate_photos(&[
            photo("big.png", "image/png", MAX_PHOTO_BYTES + 1),
            photo("notes.pdf", "application/pdf", 10),
            photo("ok.webp", "image/webp", MAX_PHOTO_BYTES),
        ]);

        assert_eq!(
            errors,
            vec![
                "big.png exceeds the 5MB limit.".to_string(),
                "notes.pdf is not a valid image.".to_string(),
            ]
        );
    }

    #[test]
    fn test_validation_errors_serialize_as_map() {
        let mut errors = ValidationErrors::new();
        errors.add("title", "This field is required.");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["title"][0], "This field is required.");
    }
}
