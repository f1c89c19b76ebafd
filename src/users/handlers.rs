use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{Role, UpdateProfileRequest, UpdateRoleRequest};
use crate::{
    auth::{
        extractors::{AuthUser, RequireAdmin},
        repo::User,
    },
    error::AppError,
    response::{DataResponse, MessageResponse},
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct UserData {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct UsersData {
    pub users: Vec<User>,
}

async fn load_user(state: &AppState, id: Uuid) -> Result<User, AppError> {
    User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("user does not exist".into()))
}

fn ensure_role_is_new(user: &User, role: Role) -> Result<(), AppError> {
    if user.has_role(role.as_str()) {
        return Err(AppError::BadRequest(format!(
            "you already have this role: {role}"
        )));
    }
    Ok(())
}

/// GET /api/v1/users — admin only, admins themselves are not listed.
#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<DataResponse<UsersData>>, AppError> {
    let users = User::list_non_admin(&state.db).await?;
    Ok(Json(DataResponse::new(UsersData { users })))
}

/// GET /api/v1/users/profile
#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<DataResponse<UserData>>, AppError> {
    let user = load_user(&state, claims.sub).await?;
    Ok(Json(DataResponse::new(UserData { user })))
}

/// PATCH /api/v1/users/profile
#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<DataResponse<UserData>>, AppError> {
    let payload = payload.validate()?;
    let user = User::update_name(&state.db, claims.sub, &payload.name)
        .await?
        .ok_or_else(|| AppError::NotFound("user does not exist".into()))?;
    info!(user_id = %user.id, "profile updated");
    Ok(Json(DataResponse::new(UserData { user })))
}

/// GET /api/v1/users/:user_id — admin only.
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(user_id): Path<Uuid>,
) -> Result<Json<DataResponse<UserData>>, AppError> {
    let user = load_user(&state, user_id).await?;
    Ok(Json(DataResponse::new(UserData { user })))
}

/// DELETE /api/v1/users/:user_id — admin only.
#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(user_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    if !User::delete(&state.db, user_id).await? {
        return Err(AppError::NotFound("user does not exist".into()));
    }
    info!(%user_id, "user deleted");
    Ok(Json(MessageResponse::new(
        "account has been deleted successfully",
    )))
}

/// PATCH /api/v1/users/:user_id/update-role — admin only. Roles only grow;
/// an account never loses its last role through this endpoint.
#[instrument(skip(state, payload))]
pub async fn update_role(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = load_user(&state, user_id).await?;

    let role = payload.role;
    ensure_role_is_new(&user, role)?;

    User::add_role(&state.db, user.id, role.as_str()).await?;
    info!(user_id = %user.id, role = %role, "role added");
    Ok(Json(MessageResponse::new(
        "role has been updated successfully",
    )))
}
