//! Session and role guards.
//!
//! Sessions are carried as `Authorization: Bearer <token>`. The role guards
//! ask the state's [`Authorizer`](huella_core::access::Authorizer) and reject
//! with 401 when there is no session and 403 when the role is not enough.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use huella_core::access::Requirement;
use huella_storage::Account;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// The raw bearer token of the request.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        bearer(parts)
            .map(|t| BearerToken(t.to_string()))
            .ok_or(ApiError::Unauthenticated)
    }
}

/// The signed-in account, if any.
#[derive(Debug, Clone)]
pub struct MaybeAccount(pub Option<Account>);

impl FromRequestParts<AppState> for MaybeAccount {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer(parts) else {
            return Ok(MaybeAccount(None));
        };

        let account = state.db.session_account(token)?;
        if account.is_none() {
            debug!("Unknown or expired session token");
        }
        Ok(MaybeAccount(account))
    }
}

/// The signed-in account. Rejects with 401 without a valid session.
#[derive(Debug, Clone)]
pub struct CurrentAccount(pub Account);

impl FromRequestParts<AppState> for CurrentAccount {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let MaybeAccount(account) = MaybeAccount::from_request_parts(parts, state).await?;
        account.map(CurrentAccount).ok_or(ApiError::Unauthenticated)
    }
}

async fn guarded(
    parts: &mut Parts,
    state: &AppState,
    requirement: Requirement,
) -> Result<Account, ApiError> {
    let MaybeAccount(account) = MaybeAccount::from_request_parts(parts, state).await?;
    let principal = account.as_ref().map(Account::principal);

    state.authorizer.check(principal.as_ref(), requirement)?;

    account.ok_or(ApiError::Unauthenticated)
}

macro_rules! role_guard {
    ($(#[$doc:meta])* $name:ident, $requirement:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name(pub Account);

        impl FromRequestParts<AppState> for $name {
            type Rejection = ApiError;

            async fn from_request_parts(
                parts: &mut Parts,
                state: &AppState,
            ) -> Result<Self, Self::Rejection> {
                guarded(parts, state, $requirement).await.map($name)
            }
        }
    };
}

role_guard!(
    /// A moderator, admin, staff member or superuser.
    RequireModerator,
    Requirement::Moderator
);
role_guard!(
    /// An admin, staff member or superuser.
    RequireAdmin,
    Requirement::Admin
);
role_guard!(
    /// A superuser.
    RequireSuperuser,
    Requirement::Superuser
);

fn bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
