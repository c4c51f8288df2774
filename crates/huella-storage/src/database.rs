//! High-level database interface.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{Duration, NaiveDate, Utc};
use directories::ProjectDirs;
use huella_core::access::check_account_deletion;
use huella_core::moderation::{Effect, QueueFilter};
use huella_core::stats::{
    hour_histogram, trend_start, weekday_histogram, Dashboard, Quality, SectorRanking,
    SeverityDistribution,
};
use huella_core::validation::ValidReport;
use tracing::{debug, info};

use crate::error::{Result, StorageError};
use crate::models::{
    Account, AccountActivity, AccountUpdate, LogEntry, MapPin, NewAccount, NewPhoto, Photo,
    PhotoUpdate, QueuePage, Report, RoleCounts, Summary,
};
use crate::pool::ConnectionPool;
use crate::repository::{
    AccountsRepo, ModerationLogRepo, PhotosRepo, ReportsRepo, SessionsRepo, StatsRepo,
};

/// High-level database interface for Huella.
#[derive(Clone)]
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    /// Create a new database in the default app data directory.
    pub fn new() -> Result<Self> {
        Self::with_path(Self::default_db_path()?)
    }

    /// Create a new database at a specific path.
    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening database at: {:?}", path);
        let pool = ConnectionPool::new(&path)?;

        Ok(Self { pool })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let pool = ConnectionPool::in_memory()?;
        Ok(Self { pool })
    }

    /// Get the default database path.
    pub fn default_db_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "huella", "huella")
            .ok_or_else(|| StorageError::Config("Could not determine app data directory".into()))?;

        Ok(proj_dirs.data_dir().join("huella.db"))
    }

    // === Reports ===

    /// Store a validated submission and its photos in one transaction.
    pub fn submit_report(
        &self,
        report: &ValidReport,
        user_id: Option<i64>,
        photos: &[NewPhoto],
    ) -> Result<i64> {
        let conn = self.pool.get()?;
        let tx = conn.unchecked_transaction()?;

        let id = ReportsRepo::insert(&tx, report, user_id)?;
        for photo in photos {
            PhotosRepo::insert(&tx, id, photo)?;
        }

        tx.commit()?;
        info!(report_id = id, photos = photos.len(), "Report submitted");
        Ok(id)
    }

    /// Get a report by ID.
    pub fn get_report(&self, id: i64) -> Result<Option<Report>> {
        let conn = self.pool.get()?;
        ReportsRepo::get_by_id(&conn, id)
    }

    /// Get a report by ID, failing with `NotFound`.
    pub fn require_report(&self, id: i64) -> Result<Report> {
        self.get_report(id)?
            .ok_or_else(|| StorageError::NotFound(format!("report {}", id)))
    }

    /// Photos of a report, primary first.
    pub fn get_report_photos(&self, report_id: i64) -> Result<Vec<Photo>> {
        let conn = self.pool.get()?;
        PhotosRepo::list_for_report(&conn, report_id)
    }

    /// Photo counts keyed by report ID. Reports without photos are absent.
    pub fn photo_counts(&self, report_ids: &[i64]) -> Result<HashMap<i64, usize>> {
        let conn = self.pool.get()?;
        PhotosRepo::count_for_reports(&conn, report_ids)
    }

    /// One filtered page of the moderation queue.
    pub fn moderation_queue(
        &self,
        filter: &QueueFilter,
        requested_page: Option<&str>,
    ) -> Result<QueuePage> {
        let conn = self.pool.get()?;
        debug!(?filter, ?requested_page, "Loading moderation queue");
        ReportsRepo::queue(&conn, filter, requested_page)
    }

    /// Approved reports for the public map.
    pub fn map_pins(&self) -> Result<Vec<MapPin>> {
        let conn = self.pool.get()?;
        ReportsRepo::approved_for_map(&conn)
    }

    /// Every report, for export.
    pub fn all_reports(&self) -> Result<Vec<Report>> {
        let conn = self.pool.get()?;
        ReportsRepo::get_all(&conn)
    }

    /// Delete a report with its photos and log entries.
    pub fn delete_report(&self, id: i64) -> Result<()> {
        let conn = self.pool.get()?;
        if !ReportsRepo::delete(&conn, id)? {
            return Err(StorageError::NotFound(format!("report {}", id)));
        }
        info!(report_id = id, "Report deleted");
        Ok(())
    }

    // === Moderation ===

    /// Apply a moderation effect to one report.
    ///
    /// The report update and the audit entry are written in one transaction.
    pub fn moderate_report(
        &self,
        id: i64,
        moderator_id: Option<i64>,
        effect: &Effect,
    ) -> Result<Report> {
        {
            let conn = self.pool.get()?;
            let tx = conn.unchecked_transaction()?;

            if !ReportsRepo::exists(&tx, id)? {
                return Err(StorageError::NotFound(format!("report {}", id)));
            }

            let now = Utc::now();
            ReportsRepo::apply_effect(&tx, &[id], effect, moderator_id, now)?;

            if let Some(ref log) = effect.log {
                ModerationLogRepo::insert(&tx, id, moderator_id, log.action, &log.reason, now)?;
            }

            tx.commit()?;
        }

        info!(
            report_id = id,
            ?moderator_id,
            state = ?effect.state,
            "Report moderated"
        );
        self.require_report(id)
    }

    /// Apply a moderation effect to many reports at once.
    ///
    /// Returns how many reports existed and were updated.
    pub fn moderate_reports(
        &self,
        ids: &[i64],
        moderator_id: Option<i64>,
        effect: &Effect,
    ) -> Result<usize> {
        let conn = self.pool.get()?;
        let tx = conn.unchecked_transaction()?;

        let now = Utc::now();
        let updated = ReportsRepo::apply_effect(&tx, ids, effect, moderator_id, now)?;

        if let Some(ref log) = effect.log {
            for id in ids {
                if ReportsRepo::exists(&tx, *id)? {
                    ModerationLogRepo::insert(&tx, *id, moderator_id, log.action, &log.reason, now)?;
                }
            }
        }

        tx.commit()?;
        info!(requested = ids.len(), updated, state = ?effect.state, "Reports moderated in bulk");
        Ok(updated)
    }

    /// Audit trail of a report, in creation order.
    pub fn moderation_log(&self, report_id: i64) -> Result<Vec<LogEntry>> {
        let conn = self.pool.get()?;
        if !ReportsRepo::exists(&conn, report_id)? {
            return Err(StorageError::NotFound(format!("report {}", report_id)));
        }
        ModerationLogRepo::list_for_report(&conn, report_id)
    }

    /// Remove an audit entry.
    pub fn delete_log_entry(&self, id: i64) -> Result<()> {
        let conn = self.pool.get()?;
        if !ModerationLogRepo::delete(&conn, id)? {
            return Err(StorageError::NotFound(format!("log entry {}", id)));
        }
        info!(log_entry_id = id, "Moderation log entry deleted");
        Ok(())
    }

    /// Change a photo's moderation state or flags.
    pub fn update_photo(&self, id: i64, update: &PhotoUpdate) -> Result<Photo> {
        let conn = self.pool.get()?;
        if !PhotosRepo::update(&conn, id, update)? {
            return Err(StorageError::NotFound(format!("photo {}", id)));
        }
        PhotosRepo::get_by_id(&conn, id)?
            .ok_or_else(|| StorageError::NotFound(format!("photo {}", id)))
    }

    // === Statistics ===

    /// Full statistics dashboard as of `today`.
    pub fn dashboard(&self, today: NaiveDate) -> Result<Dashboard> {
        let conn = self.pool.get()?;

        let hero = StatsRepo::hero(&conn, today)?;
        let with_photo = StatsRepo::approved_with_photo(&conn)?;

        Ok(Dashboard {
            hero,
            monthly: StatsRepo::monthly(&conn, None)?,
            severity: SeverityDistribution::from_counts(&StatsRepo::severity_counts(&conn)?),
            sectors: SectorRanking::new(StatsRepo::sector_ranking(&conn)?),
            trend: StatsRepo::monthly(&conn, Some(trend_start(today)))?,
            hours: hour_histogram(&StatsRepo::hour_counts(&conn)?),
            weekdays: weekday_histogram(&StatsRepo::weekday_counts(&conn)?),
            quality: Quality::new(hero.total, hero.approved, with_photo),
        })
    }

    /// Landing page counts as of `today`.
    pub fn summary(&self, today: NaiveDate) -> Result<Summary> {
        let conn = self.pool.get()?;
        StatsRepo::summary(&conn, today)
    }

    // === Accounts ===

    /// Create an account, rejecting duplicate usernames and emails.
    pub fn create_account(&self, account: &NewAccount) -> Result<Account> {
        let id = {
            let conn = self.pool.get()?;
            let tx = conn.unchecked_transaction()?;

            if AccountsRepo::username_taken(&tx, &account.username, None)? {
                return Err(StorageError::Conflict(
                    "This username is already taken.".to_string(),
                ));
            }
            if AccountsRepo::email_taken(&tx, &account.email, None)? {
                return Err(StorageError::Conflict(
                    "This email is already registered.".to_string(),
                ));
            }

            let id = AccountsRepo::insert(&tx, account)?;
            tx.commit()?;
            id
        };

        info!(account_id = id, username = %account.username, role = account.role.as_str(), "Account created");
        self.require_account(id)
    }

    /// Get an account by ID.
    pub fn get_account(&self, id: i64) -> Result<Option<Account>> {
        let conn = self.pool.get()?;
        AccountsRepo::get_by_id(&conn, id)
    }

    /// Get an account by ID, failing with `NotFound`.
    pub fn require_account(&self, id: i64) -> Result<Account> {
        self.get_account(id)?
            .ok_or_else(|| StorageError::NotFound(format!("account {}", id)))
    }

    /// Find an account by username or email.
    pub fn find_account_by_login(&self, login: &str) -> Result<Option<Account>> {
        let conn = self.pool.get()?;
        AccountsRepo::get_by_login(&conn, login)
    }

    /// Whether an email is registered.
    pub fn email_exists(&self, email: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        AccountsRepo::email_taken(&conn, email, None)
    }

    /// All accounts with per-role counts.
    pub fn list_accounts(&self) -> Result<(Vec<Account>, RoleCounts)> {
        let conn = self.pool.get()?;
        Ok((AccountsRepo::list(&conn)?, AccountsRepo::role_counts(&conn)?))
    }

    /// Reports submitted and moderated by an account.
    pub fn account_activity(&self, id: i64) -> Result<AccountActivity> {
        let conn = self.pool.get()?;
        Ok(AccountActivity {
            reports_count: ReportsRepo::count_submitted_by(&conn, id)?,
            moderated_count: ReportsRepo::count_moderated_by(&conn, id)?,
        })
    }

    /// Update an account, rejecting an email used by another account.
    pub fn update_account(&self, id: i64, update: &AccountUpdate) -> Result<Account> {
        {
            let conn = self.pool.get()?;
            let tx = conn.unchecked_transaction()?;

            if AccountsRepo::email_taken(&tx, &update.email, Some(id))? {
                return Err(StorageError::Conflict(
                    "This email is already in use by another account.".to_string(),
                ));
            }
            if !AccountsRepo::update(&tx, id, update)? {
                return Err(StorageError::NotFound(format!("account {}", id)));
            }

            tx.commit()?;
        }

        info!(account_id = id, role = update.role.as_str(), "Account updated");
        self.require_account(id)
    }

    /// Delete an account on behalf of `actor_id`.
    ///
    /// Self-deletion and deleting the last admin are rejected as conflicts.
    pub fn delete_account(&self, actor_id: i64, id: i64) -> Result<Account> {
        let conn = self.pool.get()?;
        let tx = conn.unchecked_transaction()?;

        let account = AccountsRepo::get_by_id(&tx, id)?
            .ok_or_else(|| StorageError::NotFound(format!("account {}", id)))?;
        let admins = AccountsRepo::role_counts(&tx)?.admins;

        check_account_deletion(actor_id, id, account.role, admins)
            .map_err(|e| StorageError::Conflict(e.to_string()))?;

        AccountsRepo::delete(&tx, id)?;
        tx.commit()?;

        info!(account_id = id, actor_id, "Account deleted");
        Ok(account)
    }

    // === Sessions ===

    /// Create a new session for an account.
    pub fn create_session(&self, token: &str, account_id: i64, expires_in: Duration) -> Result<()> {
        let conn = self.pool.get()?;
        SessionsRepo::create(&conn, token, account_id, expires_in)
    }

    /// Resolve a session token to its account.
    pub fn session_account(&self, token: &str) -> Result<Option<Account>> {
        let conn = self.pool.get()?;
        match SessionsRepo::validate(&conn, token)? {
            Some(account_id) => AccountsRepo::get_by_id(&conn, account_id),
            None => Ok(None),
        }
    }

    /// Invalidate (delete) a session token.
    pub fn invalidate_session(&self, token: &str) -> Result<()> {
        let conn = self.pool.get()?;
        SessionsRepo::invalidate(&conn, token)
    }

    /// Clean up all expired sessions.
    pub fn cleanup_expired_sessions(&self) -> Result<u64> {
        let conn = self.pool.get()?;
        SessionsRepo::cleanup_expired(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_report;
    use huella_core::access::Role;
    use huella_core::moderation::{apply, Transition};
    use huella_core::report::{LogAction, ReportState, Reporter, Severity};

    fn new_account(username: &str, role: Role) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: "hash".to_string(),
            role,
            is_superuser: false,
            is_staff: false,
        }
    }

    fn photo(url: &str, order: i32) -> NewPhoto {
        NewPhoto {
            url: url.to_string(),
            display_order: order,
        }
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("huella.db");

        let id = {
            let db = Database::with_path(&path).unwrap();
            db.submit_report(&sample_report(), None, &[]).unwrap()
        };

        let db = Database::with_path(&path).unwrap();
        assert!(db.get_report(id).unwrap().is_some());
    }

    #[test]
    fn test_submit_report_with_photos() {
        let db = Database::in_memory().unwrap();
        let id = db
            .submit_report(
                &sample_report(),
                None,
                &[photo("/media/a.jpg", 1), photo("/media/b.jpg", 2)],
            )
            .unwrap();

        let report = db.require_report(id).unwrap();
        assert_eq!(report.state, ReportState::Pending);
        assert_eq!(db.get_report_photos(id).unwrap().len(), 2);
    }

    #[test]
    fn test_anonymous_report_round_trip() {
        let db = Database::in_memory().unwrap();
        let mut report = sample_report();
        report.reporter = Reporter::new(
            true,
            Some("Juan".to_string()),
            Some("juan@example.com".to_string()),
            None,
        );
        let id = db.submit_report(&report, None, &[]).unwrap();

        let stored = db.require_report(id).unwrap();
        assert!(stored.reporter.is_anonymous());
        assert_eq!(stored.reporter.name(), None);
        assert_eq!(stored.reporter.email(), None);
    }

    #[test]
    fn test_approve_reject_approve_keeps_full_trail() {
        let db = Database::in_memory().unwrap();
        let moderator = db.create_account(&new_account("mod", Role::Moderator)).unwrap();
        let id = db.submit_report(&sample_report(), None, &[]).unwrap();

        let approve = apply(&Transition::Approve).unwrap();
        let reject = apply(&Transition::Reject {
            reason: "Wrong location".to_string(),
        })
        .unwrap();

        db.moderate_report(id, Some(moderator.id), &approve).unwrap();
        db.moderate_report(id, Some(moderator.id), &reject).unwrap();
        let report = db.moderate_report(id, Some(moderator.id), &approve).unwrap();

        assert_eq!(report.state, ReportState::Approved);
        assert_eq!(report.moderator_id, Some(moderator.id));
        assert_eq!(report.moderator_username.as_deref(), Some("mod"));
        assert!(report.moderated_at.is_some());

        let log = db.moderation_log(id).unwrap();
        let actions: Vec<LogAction> = log.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![LogAction::Verified, LogAction::Rejected, LogAction::Verified]
        );
        assert_eq!(log[1].reason, "Wrong location");
    }

    #[test]
    fn test_moderate_missing_report() {
        let db = Database::in_memory().unwrap();
        let approve = apply(&Transition::Approve).unwrap();

        let err = db.moderate_report(404, None, &approve).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn test_bulk_reset_writes_no_log() {
        let db = Database::in_memory().unwrap();
        let a = db.submit_report(&sample_report(), None, &[]).unwrap();
        let b = db.submit_report(&sample_report(), None, &[]).unwrap();

        let approve = apply(&Transition::Approve).unwrap();
        db.moderate_report(a, None, &approve).unwrap();
        db.moderate_report(b, None, &approve).unwrap();

        let reset = apply(&Transition::ResetToPending).unwrap();
        assert_eq!(db.moderate_reports(&[a, b, 999], None, &reset).unwrap(), 2);

        assert_eq!(db.require_report(a).unwrap().state, ReportState::Pending);
        assert_eq!(db.moderation_log(a).unwrap().len(), 1);
    }

    #[test]
    fn test_deleting_moderator_keeps_reports_and_log() {
        let db = Database::in_memory().unwrap();
        let admin = db.create_account(&new_account("admin", Role::Admin)).unwrap();
        let moderator = db.create_account(&new_account("mod", Role::Moderator)).unwrap();
        let id = db
            .submit_report(&sample_report(), Some(moderator.id), &[])
            .unwrap();
        db.moderate_report(id, Some(moderator.id), &apply(&Transition::Approve).unwrap())
            .unwrap();

        db.delete_account(admin.id, moderator.id).unwrap();

        let report = db.require_report(id).unwrap();
        assert_eq!(report.moderator_id, None);
        assert_eq!(report.user_id, None);
        let log = db.moderation_log(id).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].moderator_id, None);
    }

    #[test]
    fn test_delete_report_cascades() {
        let db = Database::in_memory().unwrap();
        let id = db
            .submit_report(&sample_report(), None, &[photo("/media/a.jpg", 1)])
            .unwrap();
        db.moderate_report(id, None, &apply(&Transition::Approve).unwrap())
            .unwrap();

        db.delete_report(id).unwrap();
        assert!(db.get_report(id).unwrap().is_none());
        assert!(db.get_report_photos(id).unwrap().is_empty());
        assert!(matches!(
            db.delete_report(id).unwrap_err(),
            StorageError::NotFound(_)
        ));
    }

    #[test]
    fn test_dashboard() {
        let db = Database::in_memory().unwrap();
        let approve = apply(&Transition::Approve).unwrap();

        for severity in [Severity::Severe, Severity::Moderate, Severity::Moderate] {
            let mut report = sample_report();
            report.severity = severity;
            let id = db.submit_report(&report, None, &[]).unwrap();
            db.moderate_report(id, None, &approve).unwrap();
        }
        db.submit_report(&sample_report(), None, &[]).unwrap();

        let today = sample_report().incident_date;
        let dashboard = db.dashboard(today).unwrap();

        assert_eq!(
            dashboard.severity,
            SeverityDistribution {
                mild: 0,
                moderate: 2,
                severe: 1
            }
        );
        assert_eq!(dashboard.hero.total, 4);
        assert_eq!(dashboard.hero.approved, 3);
        assert_eq!(dashboard.quality.approval_rate, 75);
        assert_eq!(dashboard.quality.photo_coverage, 0);
        assert_eq!(dashboard.hours.len(), 7);
        assert_eq!(dashboard.weekdays.len(), 7);
        assert_eq!(dashboard.trend.len(), 1);
    }

    #[test]
    fn test_duplicate_accounts_are_conflicts() {
        let db = Database::in_memory().unwrap();
        db.create_account(&new_account("ana", Role::User)).unwrap();

        let mut dup = new_account("ANA", Role::User);
        dup.email = "other@example.com".to_string();
        let err = db.create_account(&dup).unwrap_err();
        assert!(matches!(err, StorageError::Conflict(ref m) if m.contains("username")));

        let mut dup = new_account("bob", Role::User);
        dup.email = "Ana@Example.com".to_string();
        let err = db.create_account(&dup).unwrap_err();
        assert!(matches!(err, StorageError::Conflict(ref m) if m.contains("email")));
    }

    #[test]
    fn test_delete_account_rules() {
        let db = Database::in_memory().unwrap();
        let root = db.create_account(&new_account("root", Role::User)).unwrap();
        let admin = db.create_account(&new_account("admin", Role::Admin)).unwrap();

        // Sole admin
        let err = db.delete_account(root.id, admin.id).unwrap_err();
        assert_eq!(
            err.to_string(),
            "You cannot delete the last administrator."
        );

        // Self
        let err = db.delete_account(admin.id, admin.id).unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));

        let second = db.create_account(&new_account("admin2", Role::Admin)).unwrap();
        db.delete_account(second.id, admin.id).unwrap();
        assert!(db.get_account(admin.id).unwrap().is_none());
    }

    #[test]
    fn test_update_account_email_conflict() {
        let db = Database::in_memory().unwrap();
        let ana = db.create_account(&new_account("ana", Role::User)).unwrap();
        db.create_account(&new_account("bob", Role::User)).unwrap();

        let update = AccountUpdate {
            email: "BOB@example.com".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            role: Role::Moderator,
        };
        assert!(matches!(
            db.update_account(ana.id, &update).unwrap_err(),
            StorageError::Conflict(_)
        ));

        let update = AccountUpdate {
            email: "ana@example.com".to_string(),
            ..update
        };
        assert_eq!(db.update_account(ana.id, &update).unwrap().role, Role::Moderator);
    }

    #[test]
    fn test_session_resolves_account() {
        let db = Database::in_memory().unwrap();
        let ana = db.create_account(&new_account("ana", Role::User)).unwrap();

        db.create_session("tok", ana.id, Duration::hours(1)).unwrap();
        assert_eq!(db.session_account("tok").unwrap().unwrap().id, ana.id);

        db.invalidate_session("tok").unwrap();
        assert!(db.session_account("tok").unwrap().is_none());
    }

    #[test]
    fn test_account_activity() {
        let db = Database::in_memory().unwrap();
        let ana = db.create_account(&new_account("ana", Role::Moderator)).unwrap();
        let id = db.submit_report(&sample_report(), Some(ana.id), &[]).unwrap();
        db.submit_report(&sample_report(), Some(ana.id), &[]).unwrap();
        db.moderate_report(id, Some(ana.id), &apply(&Transition::Approve).unwrap())
            .unwrap();

        let activity = db.account_activity(ana.id).unwrap();
        assert_eq!(activity.reports_count, 2);
        assert_eq!(activity.moderated_count, 1);
    }
}
