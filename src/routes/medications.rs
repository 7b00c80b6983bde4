use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::db::{CreateMedication, UpdateMedication};
use crate::error::AppError;
use crate::routes::auth::AuthUser;
use crate::services::medications::{MedicationService, MedicationView};
use crate::AppState;

/// Per-pet medication routes, merged under `/api/pets`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/:pet_id/medications",
            get(list_medications).post(create_medication),
        )
        .route(
            "/:pet_id/medications/:medication_id",
            put(update_medication).delete(delete_medication),
        )
}

/// Cross-pet medication routes, nested under `/api/medications`.
pub fn overview_router() -> Router<Arc<AppState>> {
    Router::new().route("/active", get(list_active))
}

#[derive(Debug, Deserialize)]
pub struct ListMedicationsQuery {
    #[serde(default)]
    pub active: bool,
}

async fn list_medications(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(pet_id): Path<String>,
    Query(query): Query<ListMedicationsQuery>,
) -> Result<Json<Vec<MedicationView>>, AppError> {
    Ok(Json(
        MedicationService::list(&state, &user.id, &pet_id, query.active).await?,
    ))
}

async fn create_medication(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(pet_id): Path<String>,
    Json(request): Json<CreateMedication>,
) -> Result<(StatusCode, Json<MedicationView>), AppError> {
    let medication = MedicationService::create(&state, &user.id, &pet_id, &request).await?;
    Ok((StatusCode::CREATED, Json(medication)))
}

async fn update_medication(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((pet_id, medication_id)): Path<(String, String)>,
    Json(request): Json<UpdateMedication>,
) -> Result<Json<MedicationView>, AppError> {
    Ok(Json(
        MedicationService::update(&state, &user.id, &pet_id, &medication_id, &request).await?,
    ))
}

async fn delete_medication(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((pet_id, medication_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    MedicationService::delete(&state, &user.id, &pet_id, &medication_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_active(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<MedicationView>>, AppError> {
    Ok(Json(
        MedicationService::active_for_user(&state, &user.id).await?,
    ))
}
