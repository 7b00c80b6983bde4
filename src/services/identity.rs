use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::db::{User, UserRepository};
use crate::error::AppResult;

/// User directory consulted when sharing a pet by email.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
}

/// Directory backed by the local `users` table, populated as users authenticate.
pub struct UserDirectory {
    pool: SqlitePool,
}

impl UserDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityProvider for UserDirectory {
    async fn resolve_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        if email.trim().is_empty() {
            return Ok(None);
        }
        UserRepository::find_by_email(&self.pool, email).await
    }
}
