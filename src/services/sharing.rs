use std::sync::Arc;

use crate::db::{GrantStore, PermissionGrant, PermissionLevel, StoreError};
use crate::error::{AccessError, AppResult};
use crate::services::authorization::{Action, AuthorizationService};
use crate::services::identity::IdentityProvider;
use crate::services::notifications::{
    notify_best_effort, AuditHook, NotificationSink, SharingEvent,
};

/// Invite and revoke collaborators on a pet.
///
/// The only writer of non-owner grants. Correctness under concurrent calls
/// rests on the store's conditional writes; nothing here takes a lock.
#[derive(Clone)]
pub struct SharingWorkflow {
    grants: Arc<dyn GrantStore>,
    authz: AuthorizationService,
    directory: Arc<dyn IdentityProvider>,
    notifier: Arc<dyn NotificationSink>,
    audit: Arc<dyn AuditHook>,
}

impl SharingWorkflow {
    pub fn new(
        grants: Arc<dyn GrantStore>,
        authz: AuthorizationService,
        directory: Arc<dyn IdentityProvider>,
        notifier: Arc<dyn NotificationSink>,
        audit: Arc<dyn AuditHook>,
    ) -> Self {
        Self {
            grants,
            authz,
            directory,
            notifier,
            audit,
        }
    }

    /// Share `pet_id` with the user registered under `target_email`.
    ///
    /// A retry after an ambiguous failure fails with `AlreadyShared` if the
    /// first attempt landed.
    pub async fn invite(
        &self,
        actor_id: &str,
        pet_id: &str,
        target_email: &str,
        level: PermissionLevel,
    ) -> AppResult<PermissionGrant> {
        self.require_manage_sharing(actor_id, pet_id).await?;

        let target = self
            .directory
            .resolve_user_by_email(target_email)
            .await?
            .ok_or(AccessError::UserNotFound)?;

        if target.id == actor_id || self.owner_of(pet_id).await?.as_deref() == Some(target.id.as_str()) {
            return Err(AccessError::SelfShareNotAllowed.into());
        }

        if level == PermissionLevel::Owner {
            return Err(AccessError::CannotGrantOwner.into());
        }

        let grant = PermissionGrant::new(pet_id, &target.id, level);
        match self.grants.put(&grant).await {
            Ok(()) => {}
            Err(StoreError::DuplicateGrant) => return Err(AccessError::AlreadyShared.into()),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            "User {} shared pet {} with user {} as {}",
            actor_id,
            pet_id,
            target.id,
            level
        );

        let event = SharingEvent::Invited {
            pet_id: pet_id.to_string(),
            level,
            by: actor_id.to_string(),
        };
        self.after_change(actor_id, &target.id, &event).await;

        Ok(grant)
    }

    /// Remove `target_user_id`'s access to `pet_id`.
    pub async fn revoke(&self, actor_id: &str, pet_id: &str, target_user_id: &str) -> AppResult<()> {
        self.require_manage_sharing(actor_id, pet_id).await?;

        if self.owner_of(pet_id).await?.as_deref() == Some(target_user_id) {
            return Err(AccessError::OwnerGrantImmutable.into());
        }

        match self.grants.delete(pet_id, target_user_id).await {
            Ok(()) => {}
            Err(StoreError::GrantNotFound) => return Err(AccessError::GrantNotFound.into()),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            "User {} revoked access of user {} to pet {}",
            actor_id,
            target_user_id,
            pet_id
        );

        let event = SharingEvent::Revoked {
            pet_id: pet_id.to_string(),
            by: actor_id.to_string(),
        };
        self.after_change(actor_id, target_user_id, &event).await;

        Ok(())
    }

    /// Atomically move an existing collaborator to another non-owner level.
    pub async fn change_level(
        &self,
        actor_id: &str,
        pet_id: &str,
        target_user_id: &str,
        level: PermissionLevel,
    ) -> AppResult<PermissionGrant> {
        self.require_manage_sharing(actor_id, pet_id).await?;

        if self.owner_of(pet_id).await?.as_deref() == Some(target_user_id) {
            return Err(AccessError::OwnerGrantImmutable.into());
        }

        if level == PermissionLevel::Owner {
            return Err(AccessError::CannotGrantOwner.into());
        }

        let grant = match self.grants.update_level(pet_id, target_user_id, level).await {
            Ok(grant) => grant,
            Err(StoreError::GrantNotFound) => return Err(AccessError::GrantNotFound.into()),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            "User {} changed access of user {} to pet {} to {}",
            actor_id,
            target_user_id,
            pet_id,
            level
        );

        let event = SharingEvent::LevelChanged {
            pet_id: pet_id.to_string(),
            level,
            by: actor_id.to_string(),
        };
        self.after_change(actor_id, target_user_id, &event).await;

        Ok(grant)
    }

    /// Every grant on the pet, owner included. Any collaborator may look.
    pub async fn collaborators(&self, actor_id: &str, pet_id: &str) -> AppResult<Vec<PermissionGrant>> {
        self.authz
            .authorize(actor_id, pet_id, Action::ReadProfile)
            .await?;
        Ok(self.grants.get_by_pet(pet_id).await?)
    }

    async fn require_manage_sharing(&self, actor_id: &str, pet_id: &str) -> AppResult<()> {
        let decision = self
            .authz
            .decide(actor_id, pet_id, Action::ManageSharing)
            .await?;

        if decision.is_allowed() {
            Ok(())
        } else {
            Err(AccessError::InsufficientPermission.into())
        }
    }

    async fn owner_of(&self, pet_id: &str) -> Result<Option<String>, StoreError> {
        let grants = self.grants.get_by_pet(pet_id).await?;
        Ok(grants.into_iter().find(|g| g.is_owner()).map(|g| g.user_id))
    }

    async fn after_change(&self, actor_id: &str, target_user_id: &str, event: &SharingEvent) {
        self.audit.record(actor_id, target_user_id, event);
        notify_best_effort(self.notifier.as_ref(), target_user_id, event).await;
    }
}
