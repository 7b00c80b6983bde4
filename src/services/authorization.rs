use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::db::{GrantStore, PermissionLevel, StoreError};
use crate::error::{AccessError, AppResult};

/// Operations on pet-scoped data that require an authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ReadProfile,
    ReadSubResource,
    CreateSubResource,
    EditSubResource,
    DeleteSubResource,
    ManageSharing,
    DeletePet,
}

impl Action {
    /// Lowest level that may perform this action.
    pub fn required_level(&self) -> PermissionLevel {
        match self {
            Action::ReadProfile | Action::ReadSubResource => PermissionLevel::Viewer,
            Action::CreateSubResource | Action::EditSubResource | Action::DeleteSubResource => {
                PermissionLevel::Editor
            }
            Action::ManageSharing | Action::DeletePet => PermissionLevel::Owner,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The actor holds no grant on the pet.
    NoAccess,
    /// The actor's grant is below the level the action requires.
    InsufficientPermission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// The decision table: a pure function of the actor's level (if any).
pub fn evaluate(level: Option<PermissionLevel>, action: Action) -> Decision {
    match level {
        None => Decision::Deny(DenyReason::NoAccess),
        Some(level) if level >= action.required_level() => Decision::Allow,
        Some(_) => Decision::Deny(DenyReason::InsufficientPermission),
    }
}

#[derive(Clone)]
pub struct AuthorizationService {
    grants: Arc<dyn GrantStore>,
}

impl AuthorizationService {
    pub fn new(grants: Arc<dyn GrantStore>) -> Self {
        Self { grants }
    }

    /// Decide whether `actor_id` may perform `action` on `pet_id`.
    ///
    /// Performs exactly one grant lookup and never writes. Store failures are
    /// returned as errors rather than turned into a decision.
    pub async fn decide(
        &self,
        actor_id: &str,
        pet_id: &str,
        action: Action,
    ) -> Result<Decision, StoreError> {
        let grant = self.grants.get_one(pet_id, actor_id).await?;
        let decision = evaluate(grant.map(|g| g.level), action);

        if let Decision::Deny(reason) = decision {
            log_denial(actor_id, pet_id, action, reason);
        }

        Ok(decision)
    }

    /// Like [`decide`](Self::decide), but turns a denial into an error and
    /// returns the actor's level on success.
    pub async fn authorize(
        &self,
        actor_id: &str,
        pet_id: &str,
        action: Action,
    ) -> AppResult<PermissionLevel> {
        let level = self.grants.get_one(pet_id, actor_id).await?.map(|g| g.level);

        match (evaluate(level, action), level) {
            (Decision::Allow, Some(level)) => Ok(level),
            (Decision::Deny(reason), _) => {
                log_denial(actor_id, pet_id, action, reason);
                Err(AccessError::from(reason).into())
            }
            (Decision::Allow, None) => Err(AccessError::NoAccess.into()),
        }
    }
}

impl From<DenyReason> for AccessError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::NoAccess => AccessError::NoAccess,
            DenyReason::InsufficientPermission => AccessError::InsufficientPermission,
        }
    }
}

fn log_denial(actor_id: &str, pet_id: &str, action: Action, reason: DenyReason) {
    tracing::warn!(
        "Access denied: user {} attempted {:?} on pet {} ({:?})",
        actor_id,
        action,
        pet_id,
        reason
    );
}
