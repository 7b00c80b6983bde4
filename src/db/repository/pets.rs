use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::db::repository::grants::SqliteGrantStore;
use crate::error::{AppError, AppResult};

// ============================================================================
// Pet Repository
// ============================================================================

const PET_COLUMNS: &str =
    "id, owner_id, name, species, breed, birth_date, weight_kg, notes, created_at, updated_at";

pub struct PetRepository;

impl PetRepository {
    /// Create a pet together with its owner grant in one transaction.
    pub async fn create_with_owner_grant(
        pool: &SqlitePool,
        owner_id: &str,
        input: &CreatePet,
    ) -> AppResult<(Pet, PermissionGrant)> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let mut tx = pool.begin().await.map_err(AppError::Database)?;

        let pet = sqlx::query_as::<_, Pet>(&format!(
            r#"
            INSERT INTO pets (
                id, owner_id, name, species, breed, birth_date, weight_kg, notes,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            PET_COLUMNS
        ))
        .bind(&id)
        .bind(owner_id)
        .bind(input.name.trim())
        .bind(input.species.trim())
        .bind(&input.breed)
        .bind(input.birth_date)
        .bind(input.weight_kg)
        .bind(&input.notes)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        let grant = PermissionGrant::new(&pet.id, owner_id, PermissionLevel::Owner);
        SqliteGrantStore::insert_with(&mut *tx, &grant).await?;

        tx.commit().await.map_err(AppError::Database)?;

        Ok((pet, grant))
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Pet>> {
        sqlx::query_as::<_, Pet>(&format!("SELECT {} FROM pets WHERE id = ?", PET_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find_by_ids(pool: &SqlitePool, ids: &[String]) -> AppResult<Vec<Pet>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM pets WHERE id IN ({}) ORDER BY name ASC",
            PET_COLUMNS, placeholders
        );

        let mut query = sqlx::query_as::<_, Pet>(&sql);
        for id in ids {
            query = query.bind(id);
        }

        query.fetch_all(pool).await.map_err(AppError::Database)
    }

    pub async fn update(pool: &SqlitePool, id: &str, update: &UpdatePet) -> AppResult<Option<Pet>> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Pet>(&format!(
            r#"
            UPDATE pets
            SET
                name = COALESCE(?, name),
                species = COALESCE(?, species),
                breed = COALESCE(?, breed),
                birth_date = COALESCE(?, birth_date),
                weight_kg = COALESCE(?, weight_kg),
                notes = COALESCE(?, notes),
                updated_at = ?
            WHERE id = ?
            RETURNING {}
            "#,
            PET_COLUMNS
        ))
        .bind(update.name.as_deref().map(str::trim))
        .bind(update.species.as_deref().map(str::trim))
        .bind(&update.breed)
        .bind(update.birth_date)
        .bind(update.weight_kg)
        .bind(&update.notes)
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Delete a pet and every grant on it in one transaction.
    ///
    /// Returns the grants that were removed; sub-resources go with the pet via
    /// `ON DELETE CASCADE`.
    pub async fn delete_with_grants(
        pool: &SqlitePool,
        id: &str,
    ) -> AppResult<Option<Vec<PermissionGrant>>> {
        let mut tx = pool.begin().await.map_err(AppError::Database)?;

        let grants = SqliteGrantStore::list_by_pet_with(&mut *tx, id).await?;

        sqlx::query("DELETE FROM permission_grants WHERE pet_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        let deleted = sqlx::query("DELETE FROM pets WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await.map_err(AppError::Database)?;
            return Ok(None);
        }

        tx.commit().await.map_err(AppError::Database)?;
        Ok(Some(grants))
    }
}
