use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};

use crate::db::{CreateFood, CreateHealthRecord, Food, HealthRecord};
use crate::error::AppError;
use crate::routes::auth::AuthUser;
use crate::services::records::{FoodService, HealthRecordService};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:pet_id/records", get(list_records).post(create_record))
        .route("/:pet_id/records/:record_id", delete(delete_record))
        .route("/:pet_id/foods", get(list_foods).post(create_food))
        .route("/:pet_id/foods/:food_id", delete(delete_food))
}

// ============================================================================
// Health Records
// ============================================================================

async fn list_records(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(pet_id): Path<String>,
) -> Result<Json<Vec<HealthRecord>>, AppError> {
    Ok(Json(
        HealthRecordService::list(&state, &user.id, &pet_id).await?,
    ))
}

async fn create_record(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(pet_id): Path<String>,
    Json(request): Json<CreateHealthRecord>,
) -> Result<(StatusCode, Json<HealthRecord>), AppError> {
    let record = HealthRecordService::create(&state, &user.id, &pet_id, &request).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn delete_record(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((pet_id, record_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    HealthRecordService::delete(&state, &user.id, &pet_id, &record_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Foods
// ============================================================================

async fn list_foods(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(pet_id): Path<String>,
) -> Result<Json<Vec<Food>>, AppError> {
    Ok(Json(FoodService::list(&state, &user.id, &pet_id).await?))
}

async fn create_food(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(pet_id): Path<String>,
    Json(request): Json<CreateFood>,
) -> Result<(StatusCode, Json<Food>), AppError> {
    let food = FoodService::create(&state, &user.id, &pet_id, &request).await?;
    Ok((StatusCode::CREATED, Json(food)))
}

async fn delete_food(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((pet_id, food_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    FoodService::delete(&state, &user.id, &pet_id, &food_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
