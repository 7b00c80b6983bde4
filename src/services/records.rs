use std::sync::Arc;

use crate::db::{
    CreateFood, CreateHealthRecord, Food, FoodRepository, HealthRecord, HealthRecordRepository,
    RECORD_KINDS,
};
use crate::error::{AppError, AppResult};
use crate::services::authorization::Action;
use crate::AppState;

// ============================================================================
// Health Records
// ============================================================================

pub struct HealthRecordService;

impl HealthRecordService {
    pub async fn list(state: &Arc<AppState>, actor_id: &str, pet_id: &str) -> AppResult<Vec<HealthRecord>> {
        state
            .authz
            .authorize(actor_id, pet_id, Action::ReadSubResource)
            .await?;
        HealthRecordRepository::list_by_pet(&state.db, pet_id).await
    }

    pub async fn create(
        state: &Arc<AppState>,
        actor_id: &str,
        pet_id: &str,
        input: &CreateHealthRecord,
    ) -> AppResult<HealthRecord> {
        state
            .authz
            .authorize(actor_id, pet_id, Action::CreateSubResource)
            .await?;

        if !RECORD_KINDS.contains(&input.kind.as_str()) {
            return Err(AppError::Validation(format!(
                "kind must be one of: {}",
                RECORD_KINDS.join(", ")
            )));
        }
        if input.title.trim().is_empty() {
            return Err(AppError::Validation("title cannot be empty".to_string()));
        }

        HealthRecordRepository::create(&state.db, pet_id, actor_id, input).await
    }

    pub async fn delete(state: &Arc<AppState>, actor_id: &str, pet_id: &str, record_id: &str) -> AppResult<()> {
        state
            .authz
            .authorize(actor_id, pet_id, Action::DeleteSubResource)
            .await?;

        if !HealthRecordRepository::delete(&state.db, pet_id, record_id).await? {
            return Err(AppError::NotFound("Health record not found".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Foods
// ============================================================================

pub struct FoodService;

impl FoodService {
    pub async fn list(state: &Arc<AppState>, actor_id: &str, pet_id: &str) -> AppResult<Vec<Food>> {
        state
            .authz
            .authorize(actor_id, pet_id, Action::ReadSubResource)
            .await?;
        FoodRepository::list_by_pet(&state.db, pet_id).await
    }

    pub async fn create(
        state: &Arc<AppState>,
        actor_id: &str,
        pet_id: &str,
        input: &CreateFood,
    ) -> AppResult<Food> {
        state
            .authz
            .authorize(actor_id, pet_id, Action::CreateSubResource)
            .await?;

        if input.name.trim().is_empty() {
            return Err(AppError::Validation("name cannot be empty".to_string()));
        }
        if matches!(input.times_per_day, Some(n) if n < 1) {
            return Err(AppError::Validation(
                "times_per_day must be at least 1".to_string(),
            ));
        }

        FoodRepository::create(&state.db, pet_id, actor_id, input).await
    }

    pub async fn delete(state: &Arc<AppState>, actor_id: &str, pet_id: &str, food_id: &str) -> AppResult<()> {
        state
            .authz
            .authorize(actor_id, pet_id, Action::DeleteSubResource)
            .await?;

        if !FoodRepository::delete(&state.db, pet_id, food_id).await? {
            return Err(AppError::NotFound("Food not found".to_string()));
        }
        Ok(())
    }
}
