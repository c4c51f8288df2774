//! Role-based access rules.
//!
//! Every account has a [`Role`] (via its profile) plus the `is_superuser` and
//! `is_staff` flags. An [`Authorizer`] decides what a [`Principal`] may do;
//! the HTTP layer holds one behind an `Arc<dyn Authorizer>` and consults it
//! from request guards.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role stored in an account profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Moderator, Role::Admin];

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
        }
    }

    /// Parse from database string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "moderator" => Some(Self::Moderator),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Moderator => "Moderator",
            Self::Admin => "Administrator",
        }
    }
}

/// The authenticated account making a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub account_id: i64,
    pub username: String,
    pub role: Role,
    pub is_superuser: bool,
    pub is_staff: bool,
}

/// Minimum privilege an operation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Moderator,
    Admin,
    Superuser,
}

/// Access check failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("You must sign in to continue.")]
    Unauthenticated,

    #[error("You do not have permission to perform this action.")]
    Forbidden,
}

/// Decides which operations a principal may perform.
pub trait Authorizer: Send + Sync {
    /// May review and moderate reports.
    fn is_moderator(&self, principal: &Principal) -> bool;

    /// May manage accounts and perform bulk actions.
    fn is_admin(&self, principal: &Principal) -> bool;

    fn is_superuser(&self, principal: &Principal) -> bool {
        principal.is_superuser
    }

    /// Check a requirement, for an optional principal.
    fn check(
        &self,
        principal: Option<&Principal>,
        requirement: Requirement,
    ) -> Result<(), AccessError> {
        let principal = principal.ok_or(AccessError::Unauthenticated)?;
        let allowed = match requirement {
            Requirement::Moderator => self.is_moderator(principal),
            Requirement::Admin => self.is_admin(principal),
            Requirement::Superuser => self.is_superuser(principal),
        };

        if allowed {
            Ok(())
        } else {
            Err(AccessError::Forbidden)
        }
    }
}

/// Authorizer based on profile roles and account flags.
///
/// Superusers and staff pass every moderator and admin check.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleAuthorizer;

impl Authorizer for RoleAuthorizer {
    fn is_moderator(&self, principal: &Principal) -> bool {
        principal.is_superuser
            || principal.is_staff
            || matches!(principal.role, Role::Moderator | Role::Admin)
    }

    fn is_admin(&self, principal: &Principal) -> bool {
        principal.is_superuser || principal.is_staff || principal.role == Role::Admin
    }
}

/// Reasons an account cannot be deleted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountRuleError {
    #[error("You cannot delete your own account.")]
    SelfDeletion,

    #[error("You cannot delete the last administrator.")]
    LastAdmin,
}

/// Check that `actor_id` may delete `target_id`.
///
/// `admin_count` is the number of accounts whose profile role is admin.
pub fn check_account_deletion(
    actor_id: i64,
    target_id: i64,
    target_role: Role,
    admin_count: i64,
) -> Result<(), AccountRuleError> {
    if actor_id == target_id {
        return Err(AccountRuleError::SelfDeletion);
    }
    if target_role == Role::Admin && admin_count <= 1 {
        return Err(AccountRuleError::LastAdmin);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role) -> Principal {
        Principal {
            account_id: 1,
            username: "ana".to_string(),
            role,
            is_superuser: false,
            is_staff: false,
        }
    }

    #[test]
    fn test_role_checks() {
        let auth = RoleAuthorizer;

        assert!(!auth.is_moderator(&principal(Role::User)));
        assert!(auth.is_moderator(&principal(Role::Moderator)));
        assert!(auth.is_moderator(&principal(Role::Admin)));

        assert!(!auth.is_admin(&principal(Role::User)));
        assert!(!auth.is_admin(&principal(Role::Moderator)));
        assert!(auth.is_admin(&principal(Role::Admin)));
    }

    #[test]
    fn test_staff_and_superuser_pass_role_checks() {
        let auth = RoleAuthorizer;

        let staff = Principal {
            is_staff: true,
            ..principal(Role::User)
        };
        assert!(auth.is_moderator(&staff));
        assert!(auth.is_admin(&staff));
        assert!(!auth.is_superuser(&staff));

        let root = Principal {
            is_superuser: true,
            ..principal(Role::User)
        };
        assert!(auth.is_admin(&root));
        assert!(auth.is_superuser(&root));
    }

    #[test]
    fn test_check() {
        let auth = RoleAuthorizer;

        assert_eq!(
            auth.check(None, Requirement::Moderator),
            Err(AccessError::Unauthenticated)
        );
        assert_eq!(
            auth.check(Some(&principal(Role::User)), Requirement::Moderator),
            Err(AccessError::Forbidden)
        );
        assert_eq!(
            auth.check(Some(&principal(Role::Moderator)), Requirement::Admin),
            Err(AccessError::Forbidden)
        );
        assert!(auth
            .check(Some(&principal(Role::Admin)), Requirement::Admin)
            .is_ok());
        assert_eq!(
            auth.check(Some(&principal(Role::Admin)), Requirement::Superuser),
            Err(AccessError::Forbidden)
        );
    }

    #[test]
    fn test_role_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("root"), None);
    }

    #[test]
    fn test_account_deletion_rules() {
        assert_eq!(
            check_account_deletion(1, 1, Role::Admin, 3),
            Err(AccountRuleError::SelfDeletion)
        );
        assert_eq!(
            check_account_deletion(1, 2, Role::Admin, 1),
            Err(AccountRuleError::LastAdmin)
        );
        assert!(check_account_deletion(1, 2, Role::Admin, 2).is_ok());
        assert!(check_account_deletion(1, 2, Role::User, 0).is_ok());
    }
}
