use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::db::{PermissionGrant, PermissionLevel, UserRepository};
use crate::error::AppError;
use crate::routes::auth::AuthUser;
use crate::routes::pets::parse_level;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:pet_id/shares", get(list_shares).post(create_share))
        .route(
            "/:pet_id/shares/:user_id",
            put(update_share).delete(revoke_share),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateShareRequest {
    pub email: String,
    pub level: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateShareRequest {
    pub level: String,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub user_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub level: PermissionLevel,
    pub granted_at: NaiveDateTime,
}

impl ShareResponse {
    fn bare(grant: PermissionGrant) -> Self {
        Self {
            user_id: grant.user_id,
            email: None,
            display_name: None,
            level: grant.level,
            granted_at: grant.granted_at,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_shares(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(pet_id): Path<String>,
) -> Result<Json<Vec<ShareResponse>>, AppError> {
    let grants = state.sharing.collaborators(&user.id, &pet_id).await?;

    let ids: Vec<String> = grants.iter().map(|g| g.user_id.clone()).collect();
    let users: HashMap<String, _> = UserRepository::find_by_ids(&state.db, &ids)
        .await?
        .into_iter()
        .map(|u| (u.id.clone(), u))
        .collect();

    let shares = grants
        .into_iter()
        .map(|grant| {
            let user = users.get(&grant.user_id);
            let mut share = ShareResponse::bare(grant);
            share.email = user.map(|u| u.email.clone());
            share.display_name = user.map(|u| u.display_name.clone());
            share
        })
        .collect();

    Ok(Json(shares))
}

async fn create_share(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(pet_id): Path<String>,
    Json(request): Json<CreateShareRequest>,
) -> Result<(StatusCode, Json<ShareResponse>), AppError> {
    let level = parse_level(&request.level)?;
    let grant = state
        .sharing
        .invite(&user.id, &pet_id, &request.email, level)
        .await?;

    let mut share = ShareResponse::bare(grant);
    share.email = Some(crate::db::normalize_email(&request.email));
    Ok((StatusCode::CREATED, Json(share)))
}

async fn update_share(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((pet_id, target_user_id)): Path<(String, String)>,
    Json(request): Json<UpdateShareRequest>,
) -> Result<Json<ShareResponse>, AppError> {
    let level = parse_level(&request.level)?;
    let grant = state
        .sharing
        .change_level(&user.id, &pet_id, &target_user_id, level)
        .await?;
    Ok(Json(ShareResponse::bare(grant)))
}

async fn revoke_share(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((pet_id, target_user_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state
        .sharing
        .revoke(&user.id, &pet_id, &target_user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
