//! User management endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use huella_core::access::Role;
use huella_core::auth::hash_password;
use huella_storage::models::split_name;
use huella_storage::{AccountUpdate, NewAccount};
use tracing::info;

use crate::error::{ApiError, Result};
use crate::extractors::{RequireAdmin, RequireModerator};
use crate::models::{
    CreateUserRequest, MessageResponse, UpdateUserRequest, UserData, UserSummary, UsersResponse,
};
use crate::state::AppState;

fn parse_role(role: &str) -> Result<Role> {
    Role::parse(role.trim()).ok_or_else(|| ApiError::Unprocessable("Invalid role.".to_string()))
}

/// GET /api/users - All accounts with per-role counts.
pub async fn list(
    State(state): State<AppState>,
    RequireModerator(_): RequireModerator,
) -> Result<Json<UsersResponse>> {
    let (accounts, counts) = state.db.list_accounts()?;

    Ok(Json(UsersResponse {
        users: accounts.into_iter().map(UserSummary::from).collect(),
        admins_count: counts.admins,
        moderators_count: counts.moderators,
        users_count: counts.users,
    }))
}

/// POST /api/users - Create an account with a role.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let name = req.name.trim();
    let username = req.username.trim();
    let email = req.email.trim();
    let password = req.password.trim();

    if [name, username, email, password, req.role.trim()]
        .iter()
        .any(|v| v.is_empty())
    {
        return Err(ApiError::Unprocessable(
            "All fields are required.".to_string(),
        ));
    }

    let role = parse_role(&req.role)?;
    let (first_name, last_name) = split_name(name);

    let account = state.db.create_account(&NewAccount {
        username: username.to_string(),
        email: email.to_string(),
        first_name,
        last_name,
        password_hash: hash_password(password)?,
        role,
        is_superuser: false,
        is_staff: false,
    })?;

    info!(
        account_id = account.id,
        admin = %admin.username,
        role = role.as_str(),
        "Account created by admin"
    );

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::ok(format!(
            "User {} created successfully.",
            account.username
        ))),
    ))
}

/// GET /api/users/{id} - One account with its activity.
pub async fn get(
    State(state): State<AppState>,
    RequireModerator(_): RequireModerator,
    Path(id): Path<i64>,
) -> Result<Json<UserData>> {
    let account = state.db.require_account(id)?;
    let activity = state.db.account_activity(id)?;
    Ok(Json(UserData::new(account, activity)))
}

/// PUT /api/users/{id} - Edit name, email and role.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<MessageResponse>> {
    let role = parse_role(&req.role)?;

    let email = req.email.trim();
    if email.is_empty() {
        return Err(ApiError::Unprocessable("Email is required.".to_string()));
    }

    let (first_name, last_name) = split_name(&req.name);
    let account = state.db.update_account(
        id,
        &AccountUpdate {
            email: email.to_string(),
            first_name,
            last_name,
            role,
        },
    )?;

    info!(account_id = account.id, admin = %admin.username, "Account edited");
    Ok(Json(MessageResponse::ok("User updated successfully.")))
}

/// DELETE /api/users/{id} - Delete an account.
///
/// Admins cannot delete themselves or the last admin.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>> {
    let account = state.db.delete_account(admin.id, id)?;
    Ok(Json(MessageResponse::ok(format!(
        "User {} deleted successfully.",
        account.username
    ))))
}
