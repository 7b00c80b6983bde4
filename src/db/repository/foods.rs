use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Food Repository
// ============================================================================

pub struct FoodRepository;

impl FoodRepository {
    pub async fn create(
        pool: &SqlitePool,
        pet_id: &str,
        created_by: &str,
        input: &CreateFood,
    ) -> AppResult<Food> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Food>(
            r#"
            INSERT INTO foods (
                id, pet_id, name, brand, portion, times_per_day, notes, created_by, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, pet_id, name, brand, portion, times_per_day, notes, created_by, created_at
            "#,
        )
        .bind(&id)
        .bind(pet_id)
        .bind(input.name.trim())
        .bind(&input.brand)
        .bind(&input.portion)
        .bind(input.times_per_day)
        .bind(&input.notes)
        .bind(created_by)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_by_pet(pool: &SqlitePool, pet_id: &str) -> AppResult<Vec<Food>> {
        sqlx::query_as::<_, Food>(
            r#"
            SELECT id, pet_id, name, brand, portion, times_per_day, notes, created_by, created_at
            FROM foods
            WHERE pet_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(pet_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn delete(pool: &SqlitePool, pet_id: &str, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM foods WHERE id = ? AND pet_id = ?")
            .bind(id)
            .bind(pet_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
