use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;

use crate::db::{CreatePet, GrantStore, Pet, PermissionLevel, UpdatePet};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::routes::{medications, records, shares};
use crate::services::pets::{PetService, PetWithAccess};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_pets).post(create_pet))
        .route("/watch", get(watch_grants))
        .route("/:pet_id", get(get_pet).put(update_pet).delete(delete_pet))
        .merge(shares::router())
        .merge(medications::router())
        .merge(records::router())
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListPetsQuery {
    pub min_level: Option<String>,
}

/// Parse a level from user input, accepting any case.
pub fn parse_level(raw: &str) -> AppResult<PermissionLevel> {
    raw.parse::<PermissionLevel>()
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_pets(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListPetsQuery>,
) -> Result<Json<Vec<PetWithAccess>>, AppError> {
    let min_level = query.min_level.as_deref().map(parse_level).transpose()?;
    let pets = PetService::list_visible(&state, &user.id, min_level).await?;
    Ok(Json(pets))
}

async fn create_pet(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreatePet>,
) -> Result<(StatusCode, Json<Pet>), AppError> {
    let pet = PetService::create(&state, &user.id, &request).await?;
    Ok((StatusCode::CREATED, Json(pet)))
}

async fn get_pet(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(pet_id): Path<String>,
) -> Result<Json<PetWithAccess>, AppError> {
    Ok(Json(PetService::get(&state, &user.id, &pet_id).await?))
}

async fn update_pet(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(pet_id): Path<String>,
    Json(request): Json<UpdatePet>,
) -> Result<Json<Pet>, AppError> {
    Ok(Json(
        PetService::update(&state, &user.id, &pet_id, &request).await?,
    ))
}

async fn delete_pet(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(pet_id): Path<String>,
) -> Result<StatusCode, AppError> {
    PetService::delete(&state, &user.id, &pet_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Server-sent stream of grant changes affecting the caller.
async fn watch_grants(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!("User {} started watching grant changes", user.id);

    let stream = state.grants.watch_by_user(&user.id).filter_map(|change| async move {
        tracing::debug!("Streaming {} change on pet {}", change.kind(), change.pet_id());
        match Event::default().event(change.kind()).json_data(&change) {
            Ok(event) => Some(Ok::<_, Infallible>(event)),
            Err(e) => {
                tracing::warn!("Failed to encode grant change: {:?}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::test_support;

    fn app(ctx: &test_support::TestContext) -> Router {
        Router::new()
            .nest("/api/pets", router())
            .with_state(ctx.state.clone())
    }

    fn request(method: &str, uri: &str, token: &str, body: Option<serde_json::Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(http::header::AUTHORIZATION, format!("Bearer {}", token));

        match body {
            Some(json) => builder
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(resp: axum::response::Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let ctx = test_support::context().await;
        let resp = app(&ctx)
            .oneshot(Request::builder().uri("/api/pets").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn share_flow_over_http() {
        let ctx = test_support::context().await;
        let alice = test_support::token(&ctx, "alice", "alice@example.com", Some("Alice"));
        let bob = test_support::token(&ctx, "bob", "bob@example.com", None);

        // Bob must have signed in once to be discoverable by email.
        let resp = app(&ctx)
            .oneshot(request("GET", "/api/pets", &bob, None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app(&ctx)
            .oneshot(request(
                "POST",
                "/api/pets",
                &alice,
                Some(serde_json::json!({ "name": "Rex", "species": "dog" })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let pet_id = json_body(resp).await["id"].as_str().unwrap().to_string();

        let resp = app(&ctx)
            .oneshot(request("GET", &format!("/api/pets/{}", pet_id), &bob, None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = json_body(resp).await;
        assert_eq!(body["error"]["code"], "NO_ACCESS");
        assert_eq!(body["error"]["details"]["message_key"], "access.no_access");

        let share = serde_json::json!({ "email": "bob@example.com", "level": "VIEWER" });
        let resp = app(&ctx)
            .oneshot(request(
                "POST",
                &format!("/api/pets/{}/shares", pet_id),
                &alice,
                Some(share.clone()),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = app(&ctx)
            .oneshot(request(
                "POST",
                &format!("/api/pets/{}/shares", pet_id),
                &alice,
                Some(share),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = app(&ctx)
            .oneshot(request("GET", "/api/pets", &bob, None))
            .await
            .unwrap();
        let pets = json_body(resp).await;
        assert_eq!(pets.as_array().unwrap().len(), 1);
        assert_eq!(pets[0]["access_level"], "viewer");

        let resp = app(&ctx)
            .oneshot(request(
                "POST",
                &format!("/api/pets/{}/medications", pet_id),
                &bob,
                Some(serde_json::json!({ "name": "Drops" })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = app(&ctx)
            .oneshot(request("DELETE", &format!("/api/pets/{}/shares/bob", pet_id), &alice, None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = app(&ctx)
            .oneshot(request("GET", "/api/pets", &bob, None))
            .await
            .unwrap();
        assert!(json_body(resp).await.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_min_level_is_bad_request() {
        let ctx = test_support::context().await;
        let token = test_support::token(&ctx, "alice", "alice@example.com", None);

        let resp = app(&ctx)
            .oneshot(request("GET", "/api/pets?min_level=admin", &token, None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
