//! Data models for storage.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use huella_core::access::{Principal, Role};
use huella_core::pagination::Page;
use huella_core::report::{
    AnimalType, Location, LogAction, PhotoState, ReportState, Reporter, Sector, Severity,
};
use serde::{Deserialize, Serialize};

/// A stored incident report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub id: i64,
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
    /// Submitting account, if any.
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub state: ReportState,
    pub moderator_id: Option<i64>,
    pub moderator_username: Option<String>,
    pub moderated_at: Option<DateTime<Utc>>,
    pub moderation_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A photo attached to a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Photo {
    pub id: i64,
    pub report_id: i64,
    pub url: String,
    /// 1-based submission order.
    pub display_order: i32,
    pub uploaded_at: DateTime<Utc>,
    pub state: PhotoState,
    pub graphic: bool,
    pub censored: bool,
}

/// Data for a new photo row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPhoto {
    pub url: String,
    pub display_order: i32,
}

/// Moderator changes to a photo. `None` leaves the field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PhotoUpdate {
    pub state: Option<PhotoState>,
    pub graphic: Option<bool>,
    pub censored: Option<bool>,
}

/// One entry of the moderation audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub id: i64,
    pub report_id: i64,
    pub moderator_id: Option<i64>,
    pub moderator_username: Option<String>,
    pub action: LogAction,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Report counts per moderation state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub all: i64,
}

/// One page of the moderation queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueuePage {
    pub reports: Vec<Report>,
    pub page: Page,
    pub counts: StateCounts,
    /// Reports matching the filters, across all pages.
    pub filtered_total: i64,
}

/// An approved report with its primary photo, for the public map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPin {
    pub report: Report,
    pub photo_url: Option<String>,
}

/// Counts shown on the landing page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: i64,
    pub approved: i64,
    pub pending: i64,
    pub this_month: i64,
}

/// A user account with its profile role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_superuser: bool,
    pub is_staff: bool,
    pub role: Role,
    pub date_joined: DateTime<Utc>,
}

impl Account {
    /// Full name, or the username when no name is set.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }

    /// Identity used for access checks.
    pub fn principal(&self) -> Principal {
        Principal {
            account_id: self.id,
            username: self.username.clone(),
            role: self.role,
            is_superuser: self.is_superuser,
            is_staff: self.is_staff,
        }
    }
}

/// Data for creating an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub role: Role,
    pub is_superuser: bool,
    pub is_staff: bool,
}

/// Editable account fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountUpdate {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

/// Number of accounts per role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoleCounts {
    pub users: i64,
    pub moderators: i64,
    pub admins: i64,
}

/// Reports linked to an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AccountActivity {
    pub reports_count: i64,
    pub moderated_count: i64,
}

/// Session record stored in database.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub token: String,
    pub account_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// Split a full name into first and last name at the first space.
pub fn split_name(name: &str) -> (String, String) {
    match name.trim().split_once(' ') {
        Some((first, last)) => (first.to_string(), last.trim().to_string()),
        None => (name.trim().to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_name() {
        assert_eq!(
            split_name("Ana María López"),
            ("Ana".to_string(), "María López".to_string())
        );
        assert_eq!(split_name(" Ana "), ("Ana".to_string(), String::new()));
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        let account = Account {
            id: 1,
            username: "ana".to_string(),
            email: "ana@example.com".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: String::new(),
            is_superuser: false,
            is_staff: false,
            role: Role::User,
            date_joined: Utc::now(),
        };
        assert_eq!(account.display_name(), "ana");

        let named = Account {
            first_name: "Ana".to_string(),
            last_name: "López".to_string(),
            ..account
        };
        assert_eq!(named.display_name(), "Ana López");
    }
}
