use std::sync::Arc;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::db::{normalize_email, User, UserRepository};
use crate::error::{AppError, AppResult};
use crate::AppState;

/// Claims asserted by the identity provider in a bearer token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub exp: usize,
    pub iat: usize,
}

pub struct AuthService;

impl AuthService {
    /// Decode and validate a JWT, returning the claims
    pub fn decode_jwt(config: &JwtConfig, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_seconds;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.secret.as_bytes()),
            &validation,
        )?;

        if token_data.claims.sub.trim().is_empty() || token_data.claims.email.trim().is_empty() {
            tracing::debug!("Token is missing subject or email claim");
            return Err(AppError::Unauthorized);
        }

        Ok(token_data.claims)
    }

    /// Resolve the acting user from a bearer token, recording them in the
    /// local directory so others can share pets with them by email.
    pub async fn authenticate(state: &Arc<AppState>, token: &str) -> AppResult<User> {
        let claims = Self::decode_jwt(&state.config.jwt, token)?;

        let display_name = claims
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| normalize_email(&claims.email));

        if let Some(existing) = UserRepository::find_by_id(&state.db, &claims.sub).await? {
            if existing.email == normalize_email(&claims.email)
                && existing.display_name == display_name
            {
                return Ok(existing);
            }
        }

        match UserRepository::upsert(&state.db, &claims.sub, &claims.email, &display_name).await {
            Err(AppError::Database(sqlx::Error::Database(db_err))) if db_err.is_unique_violation() => {
                tracing::warn!(
                    "Rejecting token for {}: email already belongs to another account",
                    claims.sub
                );
                Err(AppError::Unauthorized)
            }
            other => other,
        }
    }
}
