//! Shared fixtures for unit tests: an in-memory database with migrations
//! applied and the full set of services wired around it.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::config::Config;
use crate::db::{CreatePet, Pet, PetRepository, User, UserRepository};
use crate::services::auth::Claims;
use crate::services::init;
use crate::AppState;

pub const TEST_JWT_SECRET: &str = "test-secret";

pub struct TestContext {
    pub state: Arc<AppState>,
}

pub async fn context() -> TestContext {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);

    // One connection that never recycles: every connection to `:memory:` is
    // its own database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();

    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let mut config = Config::default();
    config.jwt.secret = TEST_JWT_SECRET.to_string();

    TestContext {
        state: init::build_state(pool, config),
    }
}

/// Register a user whose id is derived from the email's local part.
pub async fn user(ctx: &TestContext, email: &str) -> User {
    let id = format!("user-{}", email.split('@').next().unwrap_or(email));
    UserRepository::upsert(&ctx.state.db, &id, email, email)
        .await
        .unwrap()
}

pub async fn pet(ctx: &TestContext, owner: &User) -> Pet {
    let input = CreatePet {
        name: format!("Pet of {}", owner.display_name),
        species: "cat".to_string(),
        ..Default::default()
    };
    let (pet, _) = PetRepository::create_with_owner_grant(&ctx.state.db, &owner.id, &input)
        .await
        .unwrap();
    pet
}

pub fn token(ctx: &TestContext, sub: &str, email: &str, name: Option<&str>) -> String {
    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: sub.to_string(),
        email: email.to_string(),
        name: name.map(str::to_string),
        exp: now + 3600,
        iat: now,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(ctx.state.config.jwt.secret.as_bytes()),
    )
    .unwrap()
}
