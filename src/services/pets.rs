use std::sync::Arc;

use serde::Serialize;

use crate::db::{
    CreatePet, GrantChange, Pet, PermissionLevel, PetRepository, UpdatePet,
};
use crate::error::{AppError, AppResult};
use crate::services::authorization::Action;
use crate::AppState;

const MAX_FIELD_LEN: usize = 100;

/// A pet annotated with the caller's level on it.
#[derive(Debug, Clone, Serialize)]
pub struct PetWithAccess {
    #[serde(flatten)]
    pub pet: Pet,
    pub access_level: PermissionLevel,
}

pub struct PetService;

impl PetService {
    fn validate_field(value: &str, field: &str) -> AppResult<()> {
        let value = value.trim();
        if value.is_empty() {
            return Err(AppError::Validation(format!("{} cannot be empty", field)));
        }
        if value.chars().count() > MAX_FIELD_LEN {
            return Err(AppError::Validation(format!(
                "{} cannot exceed {} characters",
                field, MAX_FIELD_LEN
            )));
        }
        Ok(())
    }

    /// Create a pet owned by `owner_id`, together with its owner grant.
    pub async fn create(state: &Arc<AppState>, owner_id: &str, input: &CreatePet) -> AppResult<Pet> {
        Self::validate_field(&input.name, "name")?;
        Self::validate_field(&input.species, "species")?;

        let (pet, grant) = PetRepository::create_with_owner_grant(&state.db, owner_id, input).await?;
        state.grants.feed().publish(GrantChange::Granted(grant));

        tracing::info!("User {} created pet {}", owner_id, pet.id);
        Ok(pet)
    }

    pub async fn get(state: &Arc<AppState>, actor_id: &str, pet_id: &str) -> AppResult<PetWithAccess> {
        let level = state
            .authz
            .authorize(actor_id, pet_id, Action::ReadProfile)
            .await?;

        let pet = PetRepository::find_by_id(&state.db, pet_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Pet not found".to_string()))?;

        Ok(PetWithAccess {
            pet,
            access_level: level,
        })
    }

    pub async fn update(
        state: &Arc<AppState>,
        actor_id: &str,
        pet_id: &str,
        update: &UpdatePet,
    ) -> AppResult<Pet> {
        state
            .authz
            .authorize(actor_id, pet_id, Action::EditSubResource)
            .await?;

        if let Some(ref name) = update.name {
            Self::validate_field(name, "name")?;
        }
        if let Some(ref species) = update.species {
            Self::validate_field(species, "species")?;
        }

        PetRepository::update(&state.db, pet_id, update)
            .await?
            .ok_or_else(|| AppError::NotFound("Pet not found".to_string()))
    }

    /// Delete a pet with all of its grants and sub-resources.
    pub async fn delete(state: &Arc<AppState>, actor_id: &str, pet_id: &str) -> AppResult<()> {
        state
            .authz
            .authorize(actor_id, pet_id, Action::DeletePet)
            .await?;

        let removed = PetRepository::delete_with_grants(&state.db, pet_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Pet not found".to_string()))?;

        for grant in &removed {
            state.grants.feed().publish(GrantChange::Revoked {
                pet_id: grant.pet_id.clone(),
                user_id: grant.user_id.clone(),
            });
        }

        tracing::info!(
            "User {} deleted pet {} ({} grants removed)",
            actor_id,
            pet_id,
            removed.len()
        );
        Ok(())
    }

    /// Every pet visible to the user, optionally restricted to a minimum level.
    pub async fn list_visible(
        state: &Arc<AppState>,
        user_id: &str,
        min_level: Option<PermissionLevel>,
    ) -> AppResult<Vec<PetWithAccess>> {
        let levels = state.visibility.levels_for(user_id).await?;
        let ids: Vec<String> = levels.keys().cloned().collect();

        let ids: Vec<String> = match min_level {
            Some(min_level) => state
                .visibility
                .filter_by_min_level(user_id, &ids, min_level)
                .await?
                .into_iter()
                .collect(),
            None => ids,
        };

        let pets = PetRepository::find_by_ids(&state.db, &ids).await?;

        Ok(pets
            .into_iter()
            .filter_map(|pet| {
                let level = *levels.get(&pet.id)?;
                Some(PetWithAccess {
                    pet,
                    access_level: level,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::db::{GrantStore, PermissionGrant};
    use crate::error::AccessError;
    use crate::test_support;

    fn input(name: &str) -> CreatePet {
        CreatePet {
            name: name.to_string(),
            species: "dog".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_grants_owner() {
        let ctx = test_support::context().await;
        let owner = test_support::user(&ctx, "owner@example.com").await;

        let pet = PetService::create(&ctx.state, &owner.id, &input("Rex")).await.unwrap();
        assert_eq!(pet.owner_id, owner.id);

        let grants = ctx.state.grants.get_by_pet(&pet.id).await.unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].user_id, owner.id);
        assert_eq!(grants[0].level, PermissionLevel::Owner);
    }

    #[tokio::test]
    async fn create_validates_fields() {
        let ctx = test_support::context().await;
        let owner = test_support::user(&ctx, "owner@example.com").await;

        let err = PetService::create(&ctx.state, &owner.id, &input("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let long = "x".repeat(MAX_FIELD_LEN + 1);
        let err = PetService::create(&ctx.state, &owner.id, &input(&long))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn delete_removes_all_grants() {
        let ctx = test_support::context().await;
        let owner = test_support::user(&ctx, "owner@example.com").await;
        let editor = test_support::user(&ctx, "editor@example.com").await;
        let pet = test_support::pet(&ctx, &owner).await;

        ctx.state
            .grants
            .put(&PermissionGrant::new(&pet.id, &editor.id, PermissionLevel::Editor))
            .await
            .unwrap();

        let err = PetService::delete(&ctx.state, &editor.id, &pet.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Access(AccessError::InsufficientPermission)
        ));

        PetService::delete(&ctx.state, &owner.id, &pet.id).await.unwrap();

        assert!(ctx.state.grants.get_by_pet(&pet.id).await.unwrap().is_empty());
        assert!(ctx.state.grants.get_by_user(&editor.id).await.unwrap().is_empty());

        let err = PetService::get(&ctx.state, &owner.id, &pet.id).await.unwrap_err();
        assert!(matches!(err, AppError::Access(AccessError::NoAccess)));
    }

    #[tokio::test]
    async fn delete_notifies_collaborators() {
        let ctx = test_support::context().await;
        let owner = test_support::user(&ctx, "owner@example.com").await;
        let viewer = test_support::user(&ctx, "viewer@example.com").await;
        let pet = test_support::pet(&ctx, &owner).await;

        ctx.state
            .grants
            .put(&PermissionGrant::new(&pet.id, &viewer.id, PermissionLevel::Viewer))
            .await
            .unwrap();

        let mut changes = ctx.state.grants.feed().subscribe_user(&viewer.id);
        PetService::delete(&ctx.state, &owner.id, &pet.id).await.unwrap();

        let change = changes.next().await.unwrap();
        assert_eq!(
            change,
            GrantChange::Revoked {
                pet_id: pet.id.clone(),
                user_id: viewer.id.clone(),
            }
        );
    }

    #[tokio::test]
    async fn viewer_cannot_edit_profile() {
        let ctx = test_support::context().await;
        let owner = test_support::user(&ctx, "owner@example.com").await;
        let viewer = test_support::user(&ctx, "viewer@example.com").await;
        let editor = test_support::user(&ctx, "editor@example.com").await;
        let pet = test_support::pet(&ctx, &owner).await;

        let grants = &ctx.state.grants;
        grants
            .put(&PermissionGrant::new(&pet.id, &viewer.id, PermissionLevel::Viewer))
            .await
            .unwrap();
        grants
            .put(&PermissionGrant::new(&pet.id, &editor.id, PermissionLevel::Editor))
            .await
            .unwrap();

        let update = UpdatePet {
            weight_kg: Some(12.5),
            ..Default::default()
        };

        let err = PetService::update(&ctx.state, &viewer.id, &pet.id, &update)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Access(AccessError::InsufficientPermission)
        ));

        let updated = PetService::update(&ctx.state, &editor.id, &pet.id, &update)
            .await
            .unwrap();
        assert_eq!(updated.weight_kg, Some(12.5));
        assert_eq!(updated.name, pet.name);
    }

    #[tokio::test]
    async fn list_visible_annotates_levels() {
        let ctx = test_support::context().await;
        let alice = test_support::user(&ctx, "alice@example.com").await;
        let bob = test_support::user(&ctx, "bob@example.com").await;

        let own = PetService::create(&ctx.state, &alice.id, &input("Rex")).await.unwrap();
        let shared = PetService::create(&ctx.state, &bob.id, &input("Tom")).await.unwrap();
        PetService::create(&ctx.state, &bob.id, &input("Hidden")).await.unwrap();

        ctx.state
            .grants
            .put(&PermissionGrant::new(&shared.id, &alice.id, PermissionLevel::Viewer))
            .await
            .unwrap();

        let pets = PetService::list_visible(&ctx.state, &alice.id, None).await.unwrap();
        let names: Vec<_> = pets.iter().map(|p| p.pet.name.as_str()).collect();
        assert_eq!(names, vec!["Rex", "Tom"]);
        assert_eq!(pets[0].access_level, PermissionLevel::Owner);
        assert_eq!(pets[1].access_level, PermissionLevel::Viewer);

        let owned = PetService::list_visible(&ctx.state, &alice.id, Some(PermissionLevel::Editor))
            .await
            .unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].pet.id, own.id);
    }
}
