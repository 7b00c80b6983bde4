use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::db::{GrantStore, Medication, PermissionLevel, StoreError};
use crate::services::medication_status;

/// Which pets a user may see, and at what level.
#[derive(Clone)]
pub struct VisibilityResolver {
    grants: Arc<dyn GrantStore>,
}

impl VisibilityResolver {
    pub fn new(grants: Arc<dyn GrantStore>) -> Self {
        Self { grants }
    }

    /// The caller's level on every pet they hold a grant for.
    pub async fn levels_for(
        &self,
        user_id: &str,
    ) -> Result<BTreeMap<String, PermissionLevel>, StoreError> {
        let grants = self.grants.get_by_user(user_id).await?;

        let mut levels = BTreeMap::new();
        for grant in grants {
            // At most one grant per pair, but keep the highest if the store disagrees.
            let entry = levels.entry(grant.pet_id).or_insert(grant.level);
            if grant.level > *entry {
                *entry = grant.level;
            }
        }
        Ok(levels)
    }

    /// Owned and shared pets, de-duplicated.
    pub async fn pets_visible_to(&self, user_id: &str) -> Result<BTreeSet<String>, StoreError> {
        Ok(self.levels_for(user_id).await?.into_keys().collect())
    }

    /// Subset of `pet_ids` on which the user holds at least `min_level`.
    pub async fn filter_by_min_level(
        &self,
        user_id: &str,
        pet_ids: &[String],
        min_level: PermissionLevel,
    ) -> Result<BTreeSet<String>, StoreError> {
        let levels = self.levels_for(user_id).await?;

        Ok(pet_ids
            .iter()
            .filter(|id| levels.get(*id).map_or(false, |level| *level >= min_level))
            .cloned()
            .collect())
    }

    /// Keep medications currently being given (regular or ongoing at `now`).
    pub fn active_only(medications: Vec<Medication>, now: NaiveDateTime) -> Vec<Medication> {
        medications
            .into_iter()
            .filter(|m| medication_status::status(now, m.start_date, m.end_date).is_active())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::db::PermissionGrant;
    use crate::test_support;

    fn medication(
        name: &str,
        start_date: Option<NaiveDateTime>,
        end_date: Option<NaiveDateTime>,
    ) -> Medication {
        let now = Utc::now().naive_utc();
        Medication {
            id: name.to_string(),
            pet_id: "pet".to_string(),
            name: name.to_string(),
            dosage: None,
            frequency: None,
            start_date,
            end_date,
            notes: None,
            created_by: "user".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn owned_and_shared_pets_are_visible() {
        let ctx = test_support::context().await;
        let alice = test_support::user(&ctx, "alice@example.com").await;
        let bob = test_support::user(&ctx, "bob@example.com").await;
        let carol = test_support::user(&ctx, "carol@example.com").await;

        let rex = test_support::pet(&ctx, &alice).await;
        let tom = test_support::pet(&ctx, &bob).await;
        test_support::pet(&ctx, &carol).await;

        ctx.state
            .grants
            .put(&PermissionGrant::new(&tom.id, &alice.id, PermissionLevel::Viewer))
            .await
            .unwrap();

        let visible = ctx.state.visibility.pets_visible_to(&alice.id).await.unwrap();
        assert_eq!(visible, BTreeSet::from([rex.id.clone(), tom.id.clone()]));

        let levels = ctx.state.visibility.levels_for(&alice.id).await.unwrap();
        assert_eq!(levels[&rex.id], PermissionLevel::Owner);
        assert_eq!(levels[&tom.id], PermissionLevel::Viewer);
    }

    #[tokio::test]
    async fn shared_pet_visible_until_revoked() {
        let ctx = test_support::context().await;
        let alice = test_support::user(&ctx, "alice@example.com").await;
        let bob = test_support::user(&ctx, "bob@example.com").await;
        let pet = test_support::pet(&ctx, &alice).await;

        assert!(!ctx.state.visibility.pets_visible_to(&bob.id).await.unwrap().contains(&pet.id));

        let grant = ctx
            .state
            .sharing
            .invite(&alice.id, &pet.id, &bob.email, PermissionLevel::Editor)
            .await
            .unwrap();
        assert_eq!(grant.level, PermissionLevel::Editor);

        let visible = ctx.state.visibility.pets_visible_to(&bob.id).await.unwrap();
        assert!(visible.contains(&pet.id));

        ctx.state.sharing.revoke(&alice.id, &pet.id, &bob.id).await.unwrap();

        let visible = ctx.state.visibility.pets_visible_to(&bob.id).await.unwrap();
        assert!(!visible.contains(&pet.id));
        assert!(ctx.state.visibility.pets_visible_to(&alice.id).await.unwrap().contains(&pet.id));
    }

    #[tokio::test]
    async fn user_without_grants_sees_nothing() {
        let ctx = test_support::context().await;
        let loner = test_support::user(&ctx, "loner@example.com").await;

        let visible = ctx.state.visibility.pets_visible_to(&loner.id).await.unwrap();
        assert!(visible.is_empty());
    }

    #[tokio::test]
    async fn filter_by_min_level_drops_lower_grants() {
        let ctx = test_support::context().await;
        let alice = test_support::user(&ctx, "alice@example.com").await;
        let bob = test_support::user(&ctx, "bob@example.com").await;

        let own = test_support::pet(&ctx, &alice).await;
        let edited = test_support::pet(&ctx, &bob).await;
        let viewed = test_support::pet(&ctx, &bob).await;

        let grants = &ctx.state.grants;
        grants
            .put(&PermissionGrant::new(&edited.id, &alice.id, PermissionLevel::Editor))
            .await
            .unwrap();
        grants
            .put(&PermissionGrant::new(&viewed.id, &alice.id, PermissionLevel::Viewer))
            .await
            .unwrap();

        let ids = vec![
            own.id.clone(),
            edited.id.clone(),
            viewed.id.clone(),
            "unknown".to_string(),
        ];
        let visibility = &ctx.state.visibility;

        let editable = visibility
            .filter_by_min_level(&alice.id, &ids, PermissionLevel::Editor)
            .await
            .unwrap();
        assert_eq!(editable, BTreeSet::from([own.id.clone(), edited.id.clone()]));

        let owned = visibility
            .filter_by_min_level(&alice.id, &ids, PermissionLevel::Owner)
            .await
            .unwrap();
        assert_eq!(owned, BTreeSet::from([own.id.clone()]));

        let all = visibility
            .filter_by_min_level(&alice.id, &ids, PermissionLevel::Viewer)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn active_only_keeps_regular_and_ongoing() {
        let now = Utc::now().naive_utc();
        let day = Duration::days(1);

        let medications = vec![
            medication("regular", None, None),
            medication("ongoing", Some(now - day), Some(now + day)),
            medication("scheduled", Some(now + day), Some(now + day * 2)),
            medication("completed", Some(now - day * 2), Some(now - day)),
            medication("end-only", None, Some(now + day)),
        ];

        let active: Vec<_> = VisibilityResolver::active_only(medications, now)
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(active, vec!["regular", "ongoing", "end-only"]);
    }
}
