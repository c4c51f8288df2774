//! API request and response models.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use huella_core::access::Role;
use huella_core::pagination::Page;
use huella_core::report::{AnimalType, LogAction, PhotoState, ReportState, Sector, Severity};
use huella_storage::{Account, AccountActivity, LogEntry, MapPin, Photo, Report, StateCounts};
use serde::{Deserialize, Serialize};

/// Label used on the map for reports without a sector.
pub const NO_SECTOR: &str = "No sector";

/// Display format for dates.
pub const DISPLAY_DATE: &str = "%d/%m/%Y";

/// Display format for times.
pub const DISPLAY_TIME: &str = "%H:%M";

pub(crate) fn display_date(date: NaiveDate) -> String {
    date.format(DISPLAY_DATE).to_string()
}

pub(crate) fn display_time(time: Option<NaiveTime>) -> String {
    time.map(|t| t.format(DISPLAY_TIME).to_string())
        .unwrap_or_default()
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Generic outcome for mutations.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

// === Reports ===

/// Response to a successful submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub id: i64,
}

/// A photo as shown to clients.
#[derive(Debug, Serialize)]
pub struct PhotoResponse {
    pub id: i64,
    pub url: String,
    pub display_order: i32,
    pub state: PhotoState,
    pub graphic: bool,
    pub censored: bool,
    pub uploaded_at: DateTime<Utc>,
}

impl From<Photo> for PhotoResponse {
    fn from(photo: Photo) -> Self {
        Self {
            id: photo.id,
            url: photo.url,
            display_order: photo.display_order,
            state: photo.state,
            graphic: photo.graphic,
            censored: photo.censored,
            uploaded_at: photo.uploaded_at,
        }
    }
}

/// Public view of an approved report. Contact data is never included.
#[derive(Debug, Serialize)]
pub struct PublicReport {
    pub id: i64,
    pub title: String,
    pub date: String,
    pub time: String,
    pub animal_type: AnimalType,
    pub animal_label: &'static str,
    pub aggressor_count: i32,
    pub severity: Severity,
    pub severity_label: &'static str,
    pub description: String,
    pub address: String,
    pub sector: Option<Sector>,
    pub sector_label: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    pub reporter: String,
    pub photos: Vec<PhotoResponse>,
}

impl PublicReport {
    pub fn new(report: Report, photos: Vec<Photo>) -> Self {
        Self {
            id: report.id,
            date: display_date(report.incident_date),
            time: display_time(report.incident_time),
            animal_type: report.animal_type,
            animal_label: report.animal_type.label(),
            aggressor_count: report.aggressor_count,
            severity: report.severity,
            severity_label: report.severity.label(),
            sector: report.sector,
            sector_label: report.sector.map(|s| s.label()).unwrap_or(NO_SECTOR),
            latitude: report.location.latitude,
            longitude: report.location.longitude,
            reporter: report.reporter.visible_name().to_string(),
            title: report.title,
            description: report.description,
            address: report.address,
            photos: photos.into_iter().map(PhotoResponse::from).collect(),
        }
    }
}

/// One pin of the public map.
#[derive(Debug, Serialize)]
pub struct MapEntry {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub animal_type: AnimalType,
    pub aggressor_count: i32,
    pub severity: Severity,
    pub time: String,
    pub sector: &'static str,
    pub date: String,
    pub lat: f64,
    pub lon: f64,
    pub address: String,
    pub photo: String,
}

impl From<MapPin> for MapEntry {
    fn from(pin: MapPin) -> Self {
        let report = pin.report;
        Self {
            id: report.id,
            animal_type: report.animal_type,
            aggressor_count: report.aggressor_count,
            severity: report.severity,
            time: display_time(report.incident_time),
            sector: report.sector.map(|s| s.label()).unwrap_or(NO_SECTOR),
            date: display_date(report.incident_date),
            lat: report.location.latitude,
            lon: report.location.longitude,
            title: report.title,
            description: report.description,
            address: report.address,
            photo: pin.photo_url.unwrap_or_default(),
        }
    }
}

// === Moderation ===

/// Query parameters for the moderation queue.
#[derive(Debug, Default, Deserialize)]
pub struct QueueQuery {
    pub state: Option<String>,
    pub severity: Option<String>,
    pub animal: Option<String>,
    pub anonymous: Option<String>,
    pub page: Option<String>,
}

/// A report row in the moderation queue.
#[derive(Debug, Serialize)]
pub struct QueueItem {
    pub id: i64,
    pub title: String,
    pub date: String,
    pub animal_type: AnimalType,
    pub severity: Severity,
    pub sector_label: &'static str,
    pub state: ReportState,
    pub state_label: &'static str,
    pub reporter: String,
    pub anonymous: bool,
    pub photo_count: usize,
    pub created_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn new(report: Report, photo_count: usize) -> Self {
        Self {
            id: report.id,
            date: display_date(report.incident_date),
            animal_type: report.animal_type,
            severity: report.severity,
            sector_label: report.sector.map(|s| s.label()).unwrap_or(NO_SECTOR),
            state: report.state,
            state_label: report.state.label(),
            reporter: report.reporter.visible_name().to_string(),
            anonymous: report.reporter.is_anonymous(),
            photo_count,
            created_at: report.created_at,
            title: report.title,
        }
    }
}

/// One page of the moderation queue.
#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub reports: Vec<QueueItem>,
    pub page: Page,
    pub has_next: bool,
    pub has_previous: bool,
    pub counts: StateCounts,
    pub filtered_total: i64,
}

/// Full detail of a report for moderators.
#[derive(Debug, Serialize)]
pub struct ModeratorReport {
    pub id: i64,
    pub title: String,
    pub date: String,
    pub time: String,
    pub animal_type: &'static str,
    pub aggressor_count: i32,
    pub severity: &'static str,
    pub address: String,
    pub reporter_name: String,
    pub reporter_email: String,
    pub reporter_phone: String,
    pub anonymous: bool,
    pub username: String,
    pub sector: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    pub description: String,
    pub state: ReportState,
    pub state_label: &'static str,
    pub moderator: String,
    pub moderated_at: Option<DateTime<Utc>>,
    pub moderation_comment: String,
    pub photos: Vec<PhotoResponse>,
}

impl ModeratorReport {
    pub fn new(report: Report, photos: Vec<Photo>) -> Self {
        Self {
            id: report.id,
            date: display_date(report.incident_date),
            time: display_time(report.incident_time),
            animal_type: report.animal_type.label(),
            aggressor_count: report.aggressor_count,
            severity: report.severity.label(),
            reporter_name: report.reporter.visible_name().to_string(),
            reporter_email: report.reporter.email().unwrap_or_default().to_string(),
            reporter_phone: report.reporter.phone().unwrap_or_default().to_string(),
            anonymous: report.reporter.is_anonymous(),
            username: report.username.unwrap_or_default(),
            sector: report.sector.map(|s| s.label()).unwrap_or(NO_SECTOR),
            latitude: report.location.latitude,
            longitude: report.location.longitude,
            state: report.state,
            state_label: report.state.label(),
            moderator: report.moderator_username.unwrap_or_default(),
            moderated_at: report.moderated_at,
            moderation_comment: report.moderation_comment.unwrap_or_default(),
            title: report.title,
            address: report.address,
            description: report.description,
            photos: photos.into_iter().map(PhotoResponse::from).collect(),
        }
    }
}

/// Free-text reason for reject and comment actions.
///
/// Accepted as the `motivo` form field or JSON key.
#[derive(Debug, Default, Deserialize)]
pub struct ReasonBody {
    #[serde(default, rename = "motivo", alias = "reason")]
    pub reason: String,
}

/// Outcome of a single moderation action.
#[derive(Debug, Serialize)]
pub struct ModerationResponse {
    pub success: bool,
    pub message: String,
    pub state: ReportState,
}

/// Bulk reset or approve request.
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub ids: Vec<i64>,
}

/// Bulk reject request.
#[derive(Debug, Deserialize)]
pub struct BulkRejectRequest {
    pub ids: Vec<i64>,
    #[serde(default, rename = "motivo", alias = "reason")]
    pub reason: String,
}

/// Bulk moderation outcome.
#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub success: bool,
    pub message: String,
    pub updated: usize,
}

/// An audit trail entry.
#[derive(Debug, Serialize)]
pub struct LogEntryResponse {
    pub id: i64,
    pub action: LogAction,
    pub action_label: &'static str,
    pub reason: String,
    pub moderator: String,
    pub created_at: DateTime<Utc>,
}

impl From<LogEntry> for LogEntryResponse {
    fn from(entry: LogEntry) -> Self {
        Self {
            id: entry.id,
            action: entry.action,
            action_label: entry.action.label(),
            reason: entry.reason,
            moderator: entry.moderator_username.unwrap_or_default(),
            created_at: entry.created_at,
        }
    }
}

// === Users ===

/// Account as listed in user management.
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub role_label: &'static str,
    pub is_superuser: bool,
    pub is_staff: bool,
    pub date_joined: String,
}

impl From<Account> for UserSummary {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            name: account.display_name(),
            role: account.role,
            role_label: account.role.label(),
            is_superuser: account.is_superuser,
            is_staff: account.is_staff,
            date_joined: display_date(account.date_joined.date_naive()),
            username: account.username,
            email: account.email,
        }
    }
}

/// User list with per-role counts.
#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<UserSummary>,
    pub admins_count: i64,
    pub moderators_count: i64,
    pub users_count: i64,
}

/// One account with its activity.
#[derive(Debug, Serialize)]
pub struct UserData {
    #[serde(flatten)]
    pub user: UserSummary,
    pub reports_count: i64,
    pub moderated_count: i64,
}

impl UserData {
    pub fn new(account: Account, activity: AccountActivity) -> Self {
        Self {
            user: account.into(),
            reports_count: activity.reports_count,
            moderated_count: activity.moderated_count,
        }
    }
}

/// Admin request to create an account.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateUserRequest {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

/// Admin request to edit an account.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateUserRequest {
    pub name: String,
    pub email: String,
    pub role: String,
}

// === Auth ===

/// Login by username or email.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

/// A new session.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserSummary,
}

/// Query for the email availability check.
#[derive(Debug, Deserialize)]
pub struct CheckEmailQuery {
    #[serde(default)]
    pub email: String,
}

/// Email availability.
#[derive(Debug, Serialize)]
pub struct CheckEmailResponse {
    pub exists: bool,
}
