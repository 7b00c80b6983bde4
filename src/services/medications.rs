use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;

use crate::db::{CreateMedication, Medication, MedicationRepository, UpdateMedication};
use crate::error::{AppError, AppResult};
use crate::services::authorization::Action;
use crate::services::medication_status::{self, MedicationStatus};
use crate::services::visibility::VisibilityResolver;
use crate::AppState;

/// A medication with its status at the time of the request.
#[derive(Debug, Clone, Serialize)]
pub struct MedicationView {
    #[serde(flatten)]
    pub medication: Medication,
    pub status: MedicationStatus,
}

impl MedicationView {
    pub fn at(medication: Medication, now: NaiveDateTime) -> Self {
        let status = medication_status::status(now, medication.start_date, medication.end_date);
        Self { medication, status }
    }
}

pub struct MedicationService;

impl MedicationService {
    fn validate(
        name: Option<&str>,
        start_date: Option<NaiveDateTime>,
        end_date: Option<NaiveDateTime>,
    ) -> AppResult<()> {
        if let Some(name) = name {
            if name.trim().is_empty() {
                return Err(AppError::Validation("name cannot be empty".to_string()));
            }
        }
        if let (Some(start), Some(end)) = (start_date, end_date) {
            if end < start {
                return Err(AppError::Validation(
                    "end_date cannot be before start_date".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub async fn list(
        state: &Arc<AppState>,
        actor_id: &str,
        pet_id: &str,
        active_only: bool,
    ) -> AppResult<Vec<MedicationView>> {
        state
            .authz
            .authorize(actor_id, pet_id, Action::ReadSubResource)
            .await?;

        let now = Utc::now().naive_utc();
        let mut medications = MedicationRepository::list_by_pet(&state.db, pet_id).await?;
        if active_only {
            medications = VisibilityResolver::active_only(medications, now);
        }

        Ok(medications
            .into_iter()
            .map(|m| MedicationView::at(m, now))
            .collect())
    }

    pub async fn create(
        state: &Arc<AppState>,
        actor_id: &str,
        pet_id: &str,
        input: &CreateMedication,
    ) -> AppResult<MedicationView> {
        state
            .authz
            .authorize(actor_id, pet_id, Action::CreateSubResource)
            .await?;
        Self::validate(Some(&input.name), input.start_date, input.end_date)?;

        let medication = MedicationRepository::create(&state.db, pet_id, actor_id, input).await?;
        Ok(MedicationView::at(medication, Utc::now().naive_utc()))
    }

    pub async fn update(
        state: &Arc<AppState>,
        actor_id: &str,
        pet_id: &str,
        medication_id: &str,
        update: &UpdateMedication,
    ) -> AppResult<MedicationView> {
        state
            .authz
            .authorize(actor_id, pet_id, Action::EditSubResource)
            .await?;
        Self::validate(update.name.as_deref(), update.start_date, update.end_date)?;

        let medication = MedicationRepository::update(&state.db, pet_id, medication_id, update)
            .await?
            .ok_or_else(|| AppError::NotFound("Medication not found".to_string()))?;
        Ok(MedicationView::at(medication, Utc::now().naive_utc()))
    }

    pub async fn delete(
        state: &Arc<AppState>,
        actor_id: &str,
        pet_id: &str,
        medication_id: &str,
    ) -> AppResult<()> {
        state
            .authz
            .authorize(actor_id, pet_id, Action::DeleteSubResource)
            .await?;

        if !MedicationRepository::delete(&state.db, pet_id, medication_id).await? {
            return Err(AppError::NotFound("Medication not found".to_string()));
        }
        Ok(())
    }

    /// Active medications across every pet the user can see.
    pub async fn active_for_user(state: &Arc<AppState>, user_id: &str) -> AppResult<Vec<MedicationView>> {
        let pet_ids: Vec<String> = state
            .visibility
            .pets_visible_to(user_id)
            .await?
            .into_iter()
            .collect();

        let now = Utc::now().naive_utc();
        let medications = MedicationRepository::list_by_pets(&state.db, &pet_ids).await?;

        Ok(VisibilityResolver::active_only(medications, now)
            .into_iter()
            .map(|m| MedicationView::at(m, now))
            .collect())
    }
}
