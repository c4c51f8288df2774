//! Registration, login and logout.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use huella_core::access::Role;
use huella_core::auth::{hash_password, verify_password, AuthError, Registration, SessionToken};
use huella_storage::{Account, NewAccount};
use tracing::{debug, info};

use crate::error::Result;
use crate::extractors::{BearerToken, CurrentAccount};
use crate::models::{
    AuthResponse, CheckEmailQuery, CheckEmailResponse, LoginRequest, MessageResponse, UserSummary,
};
use crate::state::AppState;

fn start_session(state: &AppState, account: Account, message: &str) -> Result<AuthResponse> {
    let token = SessionToken::new();
    state
        .db
        .create_session(token.as_str(), account.id, state.session_lifetime)?;

    Ok(AuthResponse {
        success: true,
        message: message.to_string(),
        token: token.as_str().to_string(),
        expires_at: Utc::now() + state.session_lifetime,
        user: account.into(),
    })
}

/// POST /api/auth/register - Self-service sign-up.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<Registration>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    req.validate()?;

    let account = state.db.create_account(&NewAccount {
        username: req.normalized_username(),
        email: req.normalized_email(),
        first_name: String::new(),
        last_name: String::new(),
        password_hash: hash_password(&req.password)?,
        role: Role::User,
        is_superuser: false,
        is_staff: false,
    })?;

    info!(account_id = account.id, username = %account.username, "Account registered");

    let response = start_session(&state, account, "Account created successfully. Welcome!")?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/auth/login - Sign in with username or email.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let login = req.login.trim();
    if login.is_empty() || req.password.is_empty() {
        return Err(AuthError::MissingFields.into());
    }

    let account = state
        .db
        .find_account_by_login(login)?
        .ok_or(AuthError::UnknownAccount)?;

    if !verify_password(&req.password, &account.password_hash)? {
        debug!(account_id = account.id, "Wrong password");
        return Err(AuthError::WrongPassword.into());
    }

    info!(account_id = account.id, "Signed in");
    let message = format!("Welcome, {}!", account.display_name());
    Ok(Json(start_session(&state, account, &message)?))
}

/// POST /api/auth/logout - End the current session.
pub async fn logout(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<MessageResponse>> {
    state.db.invalidate_session(&token)?;
    Ok(Json(MessageResponse::ok("You have signed out.")))
}

/// GET /api/auth/check-email - Whether an email is registered.
pub async fn check_email(
    State(state): State<AppState>,
    Query(query): Query<CheckEmailQuery>,
) -> Result<Json<CheckEmailResponse>> {
    let email = query.email.trim();
    let exists = !email.is_empty() && state.db.email_exists(email)?;
    Ok(Json(CheckEmailResponse { exists }))
}

/// GET /api/auth/me - The signed-in account.
pub async fn me(CurrentAccount(account): CurrentAccount) -> Json<UserSummary> {
    Json(account.into())
}
