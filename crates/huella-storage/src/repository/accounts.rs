//! Accounts and profiles repository.
//!
//! Usernames and emails compare case-insensitively (`COLLATE NOCASE`).
//! Accounts without a profile row read as role `user`.

use chrono::Utc;
use huella_core::access::Role;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{decode, parse_datetime};
use crate::error::Result;
use crate::models::{Account, AccountUpdate, NewAccount, RoleCounts};

const ACCOUNT_SELECT: &str = "SELECT a.id, a.username, a.email, a.first_name, a.last_name, a.password_hash,
            a.is_superuser, a.is_staff, COALESCE(p.role, 'user'), a.date_joined
     FROM accounts a
     LEFT JOIN user_profiles p ON p.user_id = a.id";

/// Repository for account operations.
pub struct AccountsRepo;

impl AccountsRepo {
    /// Insert an account and its profile.
    pub fn insert(conn: &Connection, account: &NewAccount) -> Result<i64> {
        conn.execute(
            "INSERT INTO accounts (username, email, first_name, last_name, password_hash,
                                   is_superuser, is_staff, date_joined)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                account.username,
                account.email,
                account.first_name,
                account.last_name,
                account.password_hash,
                account.is_superuser as i32,
                account.is_staff as i32,
                Utc::now().to_rfc3339(),
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::set_role(conn, id, account.role)?;

        Ok(id)
    }

    /// Get an account by ID.
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Account>> {
        let sql = format!("{} WHERE a.id = ?1", ACCOUNT_SELECT);
        let account = conn.query_row(&sql, [id], row_to_account).optional()?;
        Ok(account)
    }

    /// Find an account by username or email.
    pub fn get_by_login(conn: &Connection, login: &str) -> Result<Option<Account>> {
        let sql = format!(
            "{} WHERE a.username = ?1 OR a.email = ?1 ORDER BY a.username = ?1 DESC LIMIT 1",
            ACCOUNT_SELECT
        );
        let account = conn
            .query_row(&sql, [login.trim()], row_to_account)
            .optional()?;
        Ok(account)
    }

    /// Whether a username is in use, optionally ignoring one account.
    pub fn username_taken(conn: &Connection, username: &str, except: Option<i64>) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE username = ?1 AND id != COALESCE(?2, -1)",
            params![username.trim(), except],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Whether an email is in use, optionally ignoring one account.
    pub fn email_taken(conn: &Connection, email: &str, except: Option<i64>) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE email = ?1 AND id != COALESCE(?2, -1)",
            params![email.trim(), except],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// All accounts, oldest first.
    pub fn list(conn: &Connection) -> Result<Vec<Account>> {
        let sql = format!("{} ORDER BY a.id ASC", ACCOUNT_SELECT);
        let mut stmt = conn.prepare(&sql)?;
        let accounts = stmt
            .query_map([], row_to_account)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    /// Number of accounts per profile role.
    pub fn role_counts(conn: &Connection) -> Result<RoleCounts> {
        let mut stmt = conn.prepare(
            "SELECT COALESCE(p.role, 'user'), COUNT(*)
             FROM accounts a
             LEFT JOIN user_profiles p ON p.user_id = a.id
             GROUP BY 1",
        )?;
        let rows: Vec<(String, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut counts = RoleCounts::default();
        for (role, count) in rows {
            match Role::parse(&role) {
                Some(Role::User) => counts.users += count,
                Some(Role::Moderator) => counts.moderators += count,
                Some(Role::Admin) => counts.admins += count,
                None => {}
            }
        }

        Ok(counts)
    }

    /// Update editable fields and the profile role.
    ///
    /// Returns `false` if the account does not exist.
    pub fn update(conn: &Connection, id: i64, update: &AccountUpdate) -> Result<bool> {
        let updated = conn.execute(
            "UPDATE accounts SET email = ?1, first_name = ?2, last_name = ?3 WHERE id = ?4",
            params![update.email, update.first_name, update.last_name, id],
        )?;

        if updated == 0 {
            return Ok(false);
        }

        Self::set_role(conn, id, update.role)?;
        Ok(true)
    }

    /// Create or replace the profile role.
    pub fn set_role(conn: &Connection, id: i64, role: Role) -> Result<()> {
        conn.execute(
            "INSERT INTO user_profiles (user_id, role) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET role = excluded.role",
            params![id, role.as_str()],
        )?;
        Ok(())
    }

    /// Delete an account. Its profile and sessions cascade; reports keep
    /// existing with the account link nulled.
    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        let deleted = conn.execute("DELETE FROM accounts WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }
}

fn row_to_account(row: &Row<'_>) -> rusqlite::Result<Account> {
    let role: String = row.get(8)?;

    Ok(Account {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        password_hash: row.get(5)?,
        is_superuser: row.get::<_, i32>(6)? != 0,
        is_staff: row.get::<_, i32>(7)? != 0,
        role: decode(8, &role, Role::parse)?,
        date_joined: parse_datetime(9, &row.get::<_, String>(9)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::run_migrations;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

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

    #[test]
    fn test_insert_and_get() {
        let conn = setup_db();
        let id = AccountsRepo::insert(&conn, &new_account("ana", Role::Moderator)).unwrap();

        let account = AccountsRepo::get_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(account.username, "ana");
        assert_eq!(account.role, Role::Moderator);
    }

    #[test]
    fn test_missing_profile_reads_as_user() {
        let conn = setup_db();
        let id = AccountsRepo::insert(&conn, &new_account("ana", Role::Admin)).unwrap();
        conn.execute("DELETE FROM user_profiles WHERE user_id = ?1", [id])
            .unwrap();

        let account = AccountsRepo::get_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(account.role, Role::User);
    }

    #[test]
    fn test_login_by_username_or_email() {
        let conn = setup_db();
        let id = AccountsRepo::insert(&conn, &new_account("ana", Role::User)).unwrap();

        let by_name = AccountsRepo::get_by_login(&conn, "ANA").unwrap().unwrap();
        let by_email = AccountsRepo::get_by_login(&conn, "Ana@Example.com")
            .unwrap()
            .unwrap();
        assert_eq!(by_name.id, id);
        assert_eq!(by_email.id, id);
        assert!(AccountsRepo::get_by_login(&conn, "nobody").unwrap().is_none());
    }

    #[test]
    fn test_uniqueness_checks_are_case_insensitive() {
        let conn = setup_db();
        let id = AccountsRepo::insert(&conn, &new_account("ana", Role::User)).unwrap();

        assert!(AccountsRepo::username_taken(&conn, "ANA", None).unwrap());
        assert!(!AccountsRepo::username_taken(&conn, "ANA", Some(id)).unwrap());
        assert!(AccountsRepo::email_taken(&conn, "ANA@example.com", None).unwrap());
        assert!(!AccountsRepo::email_taken(&conn, "bob@example.com", None).unwrap());
    }

    #[test]
    fn test_role_counts() {
        let conn = setup_db();
        AccountsRepo::insert(&conn, &new_account("a", Role::User)).unwrap();
        AccountsRepo::insert(&conn, &new_account("b", Role::User)).unwrap();
        AccountsRepo::insert(&conn, &new_account("c", Role::Moderator)).unwrap();
        AccountsRepo::insert(&conn, &new_account("d", Role::Admin)).unwrap();

        let counts = AccountsRepo::role_counts(&conn).unwrap();
        assert_eq!(
            counts,
            RoleCounts {
                users: 2,
                moderators: 1,
                admins: 1
            }
        );
    }

    #[test]
    fn test_list_fails_on_corrupt_timestamp() {
        let conn = setup_db();
        AccountsRepo::insert(&conn, &new_account("a", Role::User)).unwrap();
        let id = AccountsRepo::insert(&conn, &new_account("b", Role::User)).unwrap();
        conn.execute(
            "UPDATE accounts SET date_joined = 'yesterday-ish' WHERE id = ?1",
            [id],
        )
        .unwrap();

        assert!(AccountsRepo::list(&conn).is_err());
        assert!(AccountsRepo::get_by_id(&conn, id).is_err());
    }

    #[test]
    fn test_update_account() {
        let conn = setup_db();
        let id = AccountsRepo::insert(&conn, &new_account("ana", Role::User)).unwrap();

        let updated = AccountsRepo::update(
            &conn,
            id,
            &AccountUpdate {
                email: "new@example.com".to_string(),
                first_name: "Ana".to_string(),
                last_name: "López".to_string(),
                role: Role::Admin,
            },
        )
        .unwrap();
        assert!(updated);

        let account = AccountsRepo::get_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(account.email, "new@example.com");
        assert_eq!(account.role, Role::Admin);
        assert_eq!(account.display_name(), "Ana López");

        assert!(!AccountsRepo::update(
            &conn,
            999,
            &AccountUpdate {
                email: "x@example.com".to_string(),
                first_name: String::new(),
                last_name: String::new(),
                role: Role::User,
            }
        )
        .unwrap());
    }
}
