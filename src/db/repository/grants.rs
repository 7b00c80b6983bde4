use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tokio::sync::broadcast;

use crate::db::models::{GrantChange, PermissionGrant, PermissionLevel};

// ============================================================================
// Grant Store
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("a grant for this pet and user already exists")]
    DuplicateGrant,

    #[error("no grant exists for this pet and user")]
    GrantNotFound,

    #[error("malformed grant record: {0}")]
    Decode(String),

    #[error("store unavailable: {0}")]
    Transport(#[from] sqlx::Error),
}

/// Keyed, uniqueness-enforcing storage of permission grants.
///
/// Implementations hold no business rules. `put`, `delete` and `update_level`
/// must be conditional writes so concurrent callers racing on the same
/// (pet, user) key cannot both succeed.
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Insert a grant; fails with `DuplicateGrant` if the key is taken.
    async fn put(&self, grant: &PermissionGrant) -> Result<(), StoreError>;

    /// Remove a grant; fails with `GrantNotFound` if there is none.
    async fn delete(&self, pet_id: &str, user_id: &str) -> Result<(), StoreError>;

    async fn get_by_pet(&self, pet_id: &str) -> Result<Vec<PermissionGrant>, StoreError>;

    async fn get_by_user(&self, user_id: &str) -> Result<Vec<PermissionGrant>, StoreError>;

    async fn get_one(
        &self,
        pet_id: &str,
        user_id: &str,
    ) -> Result<Option<PermissionGrant>, StoreError>;

    /// Change the level of an existing non-owner grant in place; fails with
    /// `GrantNotFound` if there is none. The owner grant is never matched.
    async fn update_level(
        &self,
        pet_id: &str,
        user_id: &str,
        level: PermissionLevel,
    ) -> Result<PermissionGrant, StoreError>;

    /// Stream of changes affecting `user_id`, starting from the moment of the call.
    fn watch_by_user(&self, user_id: &str) -> BoxStream<'static, GrantChange>;
}

/// In-process fan-out of grant changes to `watch_by_user` subscribers.
#[derive(Clone)]
pub struct GrantFeed {
    tx: broadcast::Sender<GrantChange>,
}

impl GrantFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, change: GrantChange) {
        // No subscribers is fine.
        let _ = self.tx.send(change);
    }

    pub fn subscribe_user(&self, user_id: &str) -> BoxStream<'static, GrantChange> {
        let rx = self.tx.subscribe();
        let user_id = user_id.to_string();

        stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(change) => return Some((change, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Grant watcher lagged, skipped {} changes", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .filter(move |change| futures::future::ready(change.user_id() == user_id))
        .boxed()
    }
}

pub struct SqliteGrantStore {
    pool: SqlitePool,
    feed: GrantFeed,
}

impl SqliteGrantStore {
    pub fn new(pool: SqlitePool, feed: GrantFeed) -> Self {
        Self { pool, feed }
    }

    pub fn feed(&self) -> &GrantFeed {
        &self.feed
    }

    /// Insert a grant on an existing connection (used inside pet transactions).
    pub async fn insert_with(
        conn: &mut SqliteConnection,
        grant: &PermissionGrant,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO permission_grants (id, pet_id, user_id, level, granted_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&grant.id)
        .bind(&grant.pet_id)
        .bind(&grant.user_id)
        .bind(grant.level.as_str())
        .bind(grant.granted_at)
        .execute(conn)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::DuplicateGrant)
            }
            Err(e) => Err(StoreError::Transport(e)),
        }
    }

    /// Fetch every grant of a pet on an existing connection.
    pub async fn list_by_pet_with(
        conn: &mut SqliteConnection,
        pet_id: &str,
    ) -> Result<Vec<PermissionGrant>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, pet_id, user_id, level, granted_at
            FROM permission_grants
            WHERE pet_id = ?
            ORDER BY granted_at ASC
            "#,
        )
        .bind(pet_id)
        .fetch_all(conn)
        .await?;

        rows.iter().map(grant_from_row).collect()
    }
}

#[async_trait]
impl GrantStore for SqliteGrantStore {
    async fn put(&self, grant: &PermissionGrant) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_with(&mut *conn, grant).await?;

        self.feed.publish(GrantChange::Granted(grant.clone()));
        Ok(())
    }

    async fn delete(&self, pet_id: &str, user_id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM permission_grants WHERE pet_id = ? AND user_id = ?")
            .bind(pet_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::GrantNotFound);
        }

        self.feed.publish(GrantChange::Revoked {
            pet_id: pet_id.to_string(),
            user_id: user_id.to_string(),
        });
        Ok(())
    }

    async fn get_by_pet(&self, pet_id: &str) -> Result<Vec<PermissionGrant>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Self::list_by_pet_with(&mut *conn, pet_id).await
    }

    async fn get_by_user(&self, user_id: &str) -> Result<Vec<PermissionGrant>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, pet_id, user_id, level, granted_at
            FROM permission_grants
            WHERE user_id = ?
            ORDER BY granted_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(grant_from_row).collect()
    }

    async fn get_one(
        &self,
        pet_id: &str,
        user_id: &str,
    ) -> Result<Option<PermissionGrant>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, pet_id, user_id, level, granted_at
            FROM permission_grants
            WHERE pet_id = ? AND user_id = ?
            LIMIT 1
            "#,
        )
        .bind(pet_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(grant_from_row).transpose()
    }

    async fn update_level(
        &self,
        pet_id: &str,
        user_id: &str,
        level: PermissionLevel,
    ) -> Result<PermissionGrant, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE permission_grants
            SET level = ?
            WHERE pet_id = ? AND user_id = ? AND level != 'owner'
            RETURNING id, pet_id, user_id, level, granted_at
            "#,
        )
        .bind(level.as_str())
        .bind(pet_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;

        let row = match row {
            Ok(Some(row)) => row,
            Ok(None) => return Err(StoreError::GrantNotFound),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(StoreError::DuplicateGrant)
            }
            Err(e) => return Err(StoreError::Transport(e)),
        };

        let grant = grant_from_row(&row)?;
        self.feed.publish(GrantChange::LevelChanged(grant.clone()));
        Ok(grant)
    }

    fn watch_by_user(&self, user_id: &str) -> BoxStream<'static, GrantChange> {
        self.feed.subscribe_user(user_id)
    }
}

fn grant_from_row(r: &SqliteRow) -> Result<PermissionGrant, StoreError> {
    let decode = |e: sqlx::Error| StoreError::Decode(e.to_string());

    let level: String = r.try_get("level").map_err(decode)?;
    let level = level
        .parse::<PermissionLevel>()
        .map_err(|e| StoreError::Decode(e.to_string()))?;

    Ok(PermissionGrant {
        id: r.try_get("id").map_err(decode)?,
        pet_id: r.try_get("pet_id").map_err(decode)?,
        user_id: r.try_get("user_id").map_err(decode)?,
        level,
        granted_at: r.try_get("granted_at").map_err(decode)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[tokio::test]
    async fn put_rejects_second_grant_for_same_key() {
        let ctx = test_support::context().await;
        let owner = test_support::user(&ctx, "owner@example.com").await;
        let friend = test_support::user(&ctx, "friend@example.com").await;
        let pet = test_support::pet(&ctx, &owner).await;

        let first = PermissionGrant::new(&pet.id, &friend.id, PermissionLevel::Viewer);
        ctx.state.grants.put(&first).await.unwrap();

        let second = PermissionGrant::new(&pet.id, &friend.id, PermissionLevel::Editor);
        let err = ctx.state.grants.put(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateGrant));

        let stored = ctx.state.grants.get_one(&pet.id, &friend.id).await.unwrap();
        assert_eq!(stored.map(|g| g.level), Some(PermissionLevel::Viewer));
    }

    #[tokio::test]
    async fn delete_missing_grant_is_not_found() {
        let ctx = test_support::context().await;
        let owner = test_support::user(&ctx, "owner@example.com").await;
        let pet = test_support::pet(&ctx, &owner).await;

        let err = ctx.state.grants.delete(&pet.id, "nobody").await.unwrap_err();
        assert!(matches!(err, StoreError::GrantNotFound));
    }

    #[tokio::test]
    async fn queries_by_pet_and_by_user() {
        let ctx = test_support::context().await;
        let owner = test_support::user(&ctx, "owner@example.com").await;
        let friend = test_support::user(&ctx, "friend@example.com").await;
        let cat = test_support::pet(&ctx, &owner).await;
        let dog = test_support::pet(&ctx, &owner).await;

        ctx.state
            .grants
            .put(&PermissionGrant::new(&cat.id, &friend.id, PermissionLevel::Editor))
            .await
            .unwrap();

        let by_pet = ctx.state.grants.get_by_pet(&cat.id).await.unwrap();
        assert_eq!(by_pet.len(), 2);
        assert_eq!(by_pet.iter().filter(|g| g.is_owner()).count(), 1);

        let by_owner = ctx.state.grants.get_by_user(&owner.id).await.unwrap();
        assert_eq!(by_owner.len(), 2);
        assert!(by_owner.iter().all(|g| g.is_owner()));

        let by_friend = ctx.state.grants.get_by_user(&friend.id).await.unwrap();
        assert_eq!(by_friend.len(), 1);
        assert_eq!(by_friend[0].pet_id, cat.id);
        assert!(ctx.state.grants.get_one(&dog.id, &friend.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_level_requires_existing_grant() {
        let ctx = test_support::context().await;
        let owner = test_support::user(&ctx, "owner@example.com").await;
        let friend = test_support::user(&ctx, "friend@example.com").await;
        let pet = test_support::pet(&ctx, &owner).await;

        let err = ctx
            .state
            .grants
            .update_level(&pet.id, &friend.id, PermissionLevel::Editor)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::GrantNotFound));

        ctx.state
            .grants
            .put(&PermissionGrant::new(&pet.id, &friend.id, PermissionLevel::Viewer))
            .await
            .unwrap();
        let updated = ctx
            .state
            .grants
            .update_level(&pet.id, &friend.id, PermissionLevel::Editor)
            .await
            .unwrap();
        assert_eq!(updated.level, PermissionLevel::Editor);
    }

    #[tokio::test]
    async fn update_level_leaves_owner_grant_untouched() {
        let ctx = test_support::context().await;
        let owner = test_support::user(&ctx, "owner@example.com").await;
        let pet = test_support::pet(&ctx, &owner).await;

        let err = ctx
            .state
            .grants
            .update_level(&pet.id, &owner.id, PermissionLevel::Viewer)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::GrantNotFound));

        let grants = ctx.state.grants.get_by_pet(&pet.id).await.unwrap();
        let owners: Vec<_> = grants
            .iter()
            .filter(|g| g.level == PermissionLevel::Owner)
            .collect();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].user_id, owner.id);
    }

    #[tokio::test]
    async fn unknown_stored_level_fails_to_decode() {
        let ctx = test_support::context().await;
        let owner = test_support::user(&ctx, "owner@example.com").await;
        let pet = test_support::pet(&ctx, &owner).await;

        // Bypass the CHECK constraint to simulate a legacy row.
        sqlx::query("PRAGMA ignore_check_constraints = ON")
            .execute(&ctx.state.db)
            .await
            .unwrap();
        sqlx::query("UPDATE permission_grants SET level = 'admin' WHERE pet_id = ?")
            .bind(&pet.id)
            .execute(&ctx.state.db)
            .await
            .unwrap();

        let err = ctx.state.grants.get_one(&pet.id, &owner.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
    }

    #[tokio::test]
    async fn watchers_only_see_their_own_changes() {
        let ctx = test_support::context().await;
        let owner = test_support::user(&ctx, "owner@example.com").await;
        let friend = test_support::user(&ctx, "friend@example.com").await;
        let other = test_support::user(&ctx, "other@example.com").await;
        let pet = test_support::pet(&ctx, &owner).await;

        let mut changes = ctx.state.grants.watch_by_user(&friend.id);

        ctx.state
            .grants
            .put(&PermissionGrant::new(&pet.id, &other.id, PermissionLevel::Viewer))
            .await
            .unwrap();
        ctx.state
            .grants
            .put(&PermissionGrant::new(&pet.id, &friend.id, PermissionLevel::Viewer))
            .await
            .unwrap();
        ctx.state.grants.delete(&pet.id, &friend.id).await.unwrap();

        let first = changes.next().await.unwrap();
        assert_eq!(first.kind(), "granted");
        assert_eq!(first.user_id(), friend.id);

        let second = changes.next().await.unwrap();
        assert_eq!(second.kind(), "revoked");
        assert_eq!(second.pet_id(), pet.id);
    }
}
