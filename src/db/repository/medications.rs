use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Medication Repository
// ============================================================================

const MEDICATION_COLUMNS: &str = "id, pet_id, name, dosage, frequency, start_date, end_date, \
     notes, created_by, created_at, updated_at";

pub struct MedicationRepository;

impl MedicationRepository {
    pub async fn create(
        pool: &SqlitePool,
        pet_id: &str,
        created_by: &str,
        input: &CreateMedication,
    ) -> AppResult<Medication> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Medication>(&format!(
            r#"
            INSERT INTO medications (
                id, pet_id, name, dosage, frequency, start_date, end_date, notes,
                created_by, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            MEDICATION_COLUMNS
        ))
        .bind(&id)
        .bind(pet_id)
        .bind(input.name.trim())
        .bind(&input.dosage)
        .bind(&input.frequency)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(&input.notes)
        .bind(created_by)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_by_pet(pool: &SqlitePool, pet_id: &str) -> AppResult<Vec<Medication>> {
        sqlx::query_as::<_, Medication>(&format!(
            "SELECT {} FROM medications WHERE pet_id = ? ORDER BY created_at DESC",
            MEDICATION_COLUMNS
        ))
        .bind(pet_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_by_pets(pool: &SqlitePool, pet_ids: &[String]) -> AppResult<Vec<Medication>> {
        if pet_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; pet_ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM medications WHERE pet_id IN ({}) ORDER BY created_at DESC",
            MEDICATION_COLUMNS, placeholders
        );

        let mut query = sqlx::query_as::<_, Medication>(&sql);
        for id in pet_ids {
            query = query.bind(id);
        }

        query.fetch_all(pool).await.map_err(AppError::Database)
    }

    /// Partial update scoped to the pet; returns `None` if the medication is not on that pet.
    pub async fn update(
        pool: &SqlitePool,
        pet_id: &str,
        id: &str,
        update: &UpdateMedication,
    ) -> AppResult<Option<Medication>> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Medication>(&format!(
            r#"
            UPDATE medications
            SET
                name = COALESCE(?, name),
                dosage = COALESCE(?, dosage),
                frequency = COALESCE(?, frequency),
                start_date = COALESCE(?, start_date),
                end_date = COALESCE(?, end_date),
                notes = COALESCE(?, notes),
                updated_at = ?
            WHERE id = ? AND pet_id = ?
            RETURNING {}
            "#,
            MEDICATION_COLUMNS
        ))
        .bind(update.name.as_deref().map(str::trim))
        .bind(&update.dosage)
        .bind(&update.frequency)
        .bind(update.start_date)
        .bind(update.end_date)
        .bind(&update.notes)
        .bind(now)
        .bind(id)
        .bind(pet_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Returns whether a row was removed.
    pub async fn delete(pool: &SqlitePool, pet_id: &str, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM medications WHERE id = ? AND pet_id = ?")
            .bind(id)
            .bind(pet_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
