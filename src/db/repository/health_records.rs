use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Health Record Repository
// ============================================================================

pub struct HealthRecordRepository;

impl HealthRecordRepository {
    pub async fn create(
        pool: &SqlitePool,
        pet_id: &str,
        created_by: &str,
        input: &CreateHealthRecord,
    ) -> AppResult<HealthRecord> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, HealthRecord>(
            r#"
            INSERT INTO health_records (
                id, pet_id, kind, title, description, recorded_at, created_by, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, pet_id, kind, title, description, recorded_at, created_by, created_at
            "#,
        )
        .bind(&id)
        .bind(pet_id)
        .bind(&input.kind)
        .bind(input.title.trim())
        .bind(&input.description)
        .bind(input.recorded_at.unwrap_or(now))
        .bind(created_by)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_by_pet(pool: &SqlitePool, pet_id: &str) -> AppResult<Vec<HealthRecord>> {
        sqlx::query_as::<_, HealthRecord>(
            r#"
            SELECT id, pet_id, kind, title, description, recorded_at, created_by, created_at
            FROM health_records
            WHERE pet_id = ?
            ORDER BY recorded_at DESC
            "#,
        )
        .bind(pet_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn delete(pool: &SqlitePool, pet_id: &str, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM health_records WHERE id = ? AND pet_id = ?")
            .bind(id)
            .bind(pet_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
