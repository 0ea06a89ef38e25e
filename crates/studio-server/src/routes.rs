//! HTTP routes
//!
//! | method | path | auth | body |
//! |---|---|---|---|
//! | `GET` | `/health` | no | |
//! | `POST` | `/profiles` | bearer | initial fields as a patch |
//! | `GET` | `/profiles/{id}` | no | |
//! | `PATCH` | `/profiles/{id}` | bearer | `FlushRequest` |

use crate::rejection::{handle_rejection, reject};
use crate::state::AppState;
use serde_json::{json, Value};
use std::convert::Infallible;
use studio_core::{
    redact, validate_patch, ApiError, FlushRequest, Profile, ProfileId, ProfilePatch,
};
use tracing::{debug, info};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// All routes with error recovery and request tracing
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    health()
        .or(create_profile(state.clone()))
        .or(get_profile(state.clone()))
        .or(patch_profile(state))
        .recover(handle_rejection)
        .with(warp::trace::request())
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn json_body(limit: u64) -> impl Filter<Extract = (Value,), Error = Rejection> + Clone {
    warp::body::content_length_limit(limit).and(warp::body::json())
}

fn health() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("health").and(warp::get()).map(|| {
        warp::reply::json(&json!({
            "status": "ok",
            "version": crate::VERSION,
        }))
    })
}

fn create_profile(
    state: AppState,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("profiles")
        .and(warp::post())
        .and(warp::header::optional::<String>("authorization"))
        .and(json_body(state.max_body_bytes))
        .and(with_state(state))
        .and_then(handle_create)
}

fn get_profile(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("profiles" / ProfileId)
        .and(warp::get())
        .and(with_state(state))
        .and_then(handle_get)
}

fn patch_profile(
    state: AppState,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("profiles" / ProfileId)
        .and(warp::patch())
        .and(warp::header::optional::<String>("authorization"))
        .and(json_body(state.max_body_bytes))
        .and(with_state(state))
        .and_then(handle_patch)
}

async fn handle_create(
    authorization: Option<String>,
    body: Value,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let owner = state
        .auth
        .authenticate(authorization.as_deref())
        .map_err(reject)?;
    state.limiter.check(owner).map_err(reject)?;

    let initial: ProfilePatch = parse_body(body, "profile fields")?;
    validate_patch(&initial).map_err(reject)?;

    let profile = Profile::new(ProfileId::new(), owner).patched(&initial);
    let created = state.store.create(profile).map_err(reject)?;
    info!(profile_id = %created.id, %owner, "profile created over HTTP");

    Ok(warp::reply::with_status(
        warp::reply::json(&created),
        StatusCode::CREATED,
    ))
}

async fn handle_get(id: ProfileId, state: AppState) -> Result<impl Reply, Rejection> {
    let profile = state.store.get(id).map_err(reject)?;
    Ok(warp::reply::json(&profile))
}

async fn handle_patch(
    id: ProfileId,
    authorization: Option<String>,
    body: Value,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let owner = state
        .auth
        .authenticate(authorization.as_deref())
        .map_err(reject)?;
    state.limiter.check(owner).map_err(reject)?;

    debug!(profile_id = %id, %owner, body = %redact(&body), "flush received");

    let request: FlushRequest = parse_body(body, "flush request")?;
    if request.profile_id != id {
        return Err(reject(ApiError::validation(format!(
            "body targets profile {} but path names {id}",
            request.profile_id
        ))));
    }

    let saved = state.store.update(owner, request).await.map_err(reject)?;
    Ok(warp::reply::json(&saved))
}

fn parse_body<T: serde::de::DeserializeOwned>(body: Value, what: &str) -> Result<T, Rejection> {
    serde_json::from_value(body)
        .map_err(|e| reject(ApiError::validation(format!("invalid {what}: {e}"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenAuthenticator;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use studio_core::{ErrorEnvelope, OwnerId, StudioConfig};
    use studio_test_utils::sample_profile;

    const TOKEN: &str = "owner-token";

    fn fixture() -> (AppState, Profile) {
        let owner = OwnerId::new();
        let state = AppState::new(&StudioConfig::default()).with_authenticator(Arc::new(
            StaticTokenAuthenticator::default().with_token(TOKEN, owner),
        ));
        let created = state.store.create(sample_profile(owner)).unwrap();
        (state, created)
    }

    fn envelope(body: &[u8]) -> ErrorEnvelope {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (state, _) = fixture();
        let res = warp::test::request().path("/health").reply(&routes(state)).await;

        assert_eq!(res.status(), 200);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn get_returns_record_without_auth() {
        let (state, created) = fixture();
        let res = warp::test::request()
            .path(&format!("/profiles/{}", created.id))
            .reply(&routes(state))
            .await;

        assert_eq!(res.status(), 200);
        let profile: Profile = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(profile, created);
    }

    #[tokio::test]
    async fn get_unknown_is_enveloped_404() {
        let (state, _) = fixture();
        let res = warp::test::request()
            .path(&format!("/profiles/{}", ProfileId::new()))
            .reply(&routes(state))
            .await;

        assert_eq!(res.status(), 404);
        assert_eq!(envelope(res.body()).error.code, "not_found");
    }

    #[tokio::test]
    async fn patch_applies_flush() {
        let (state, created) = fixture();
        let request = FlushRequest::new(created.id, ProfilePatch::new().title("Over HTTP"));

        let res = warp::test::request()
            .method("PATCH")
            .path(&format!("/profiles/{}", created.id))
            .header("authorization", format!("Bearer {TOKEN}"))
            .json(&request)
            .reply(&routes(state.clone()))
            .await;

        assert_eq!(res.status(), 200);
        let saved: Profile = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(saved.title, "Over HTTP");
        assert!(saved.updated_at > created.updated_at);
        assert_eq!(state.store.get(created.id).unwrap(), saved);
    }

    #[tokio::test]
    async fn patch_without_token_is_401() {
        let (state, created) = fixture();
        let request = FlushRequest::new(created.id, ProfilePatch::new().title("x"));

        let res = warp::test::request()
            .method("PATCH")
            .path(&format!("/profiles/{}", created.id))
            .json(&request)
            .reply(&routes(state))
            .await;

        assert_eq!(res.status(), 401);
        assert_eq!(envelope(res.body()).error.code, "unauthorized");
    }

    #[tokio::test]
    async fn patch_other_owners_record_is_403() {
        let (state, _) = fixture();
        let foreign = state.store.create(sample_profile(OwnerId::new())).unwrap();
        let request = FlushRequest::new(foreign.id, ProfilePatch::new().title("x"));

        let res = warp::test::request()
            .method("PATCH")
            .path(&format!("/profiles/{}", foreign.id))
            .header("authorization", format!("Bearer {TOKEN}"))
            .json(&request)
            .reply(&routes(state))
            .await;

        assert_eq!(res.status(), 403);
        assert_eq!(envelope(res.body()).error.code, "forbidden");
    }

    #[tokio::test]
    async fn invalid_patch_lists_fields() {
        let (state, created) = fixture();
        let request = FlushRequest::new(
            created.id,
            ProfilePatch::new().accent_color(Some("blue".into())),
        );

        let res = warp::test::request()
            .method("PATCH")
            .path(&format!("/profiles/{}", created.id))
            .header("authorization", format!("Bearer {TOKEN}"))
            .json(&request)
            .reply(&routes(state))
            .await;

        assert_eq!(res.status(), 400);
        let envelope = envelope(res.body());
        assert_eq!(envelope.error.code, "validation_error");
        assert_eq!(envelope.error.fields[0].field, "accent_color");
    }

    #[tokio::test]
    async fn mismatched_path_and_body_is_400() {
        let (state, created) = fixture();
        let request = FlushRequest::new(ProfileId::new(), ProfilePatch::new().title("x"));

        let res = warp::test::request()
            .method("PATCH")
            .path(&format!("/profiles/{}", created.id))
            .header("authorization", format!("Bearer {TOKEN}"))
            .json(&request)
            .reply(&routes(state))
            .await;

        assert_eq!(res.status(), 400);
    }

    #[tokio::test]
    async fn unknown_patch_field_is_400() {
        let (state, created) = fixture();
        let body = json!({
            "profile_id": created.id,
            "mutation_id": studio_core::MutationId::new(),
            "client_time": "2024-01-01T00:00:00Z",
            "patch": { "password": "hunter2" },
        });

        let res = warp::test::request()
            .method("PATCH")
            .path(&format!("/profiles/{}", created.id))
            .header("authorization", format!("Bearer {TOKEN}"))
            .json(&body)
            .reply(&routes(state))
            .await;

        assert_eq!(res.status(), 400);
        assert_eq!(envelope(res.body()).error.code, "validation_error");
    }

    #[tokio::test]
    async fn writes_past_budget_are_429() {
        let owner = OwnerId::new();
        let mut config = StudioConfig::default();
        config.rate_limit.max_requests = 2;
        let state = AppState::new(&config).with_authenticator(Arc::new(
            StaticTokenAuthenticator::default().with_token(TOKEN, owner),
        ));
        let created = state.store.create(sample_profile(owner)).unwrap();
        let filter = routes(state);

        let mut statuses = Vec::new();
        for n in 0..3 {
            let request =
                FlushRequest::new(created.id, ProfilePatch::new().title(format!("v{n}")));
            let res = warp::test::request()
                .method("PATCH")
                .path(&format!("/profiles/{}", created.id))
                .header("authorization", format!("Bearer {TOKEN}"))
                .json(&request)
                .reply(&filter)
                .await;
            statuses.push(res.status().as_u16());
            if res.status() == 429 {
                assert!(res.headers().contains_key("retry-after"));
            }
        }

        assert_eq!(statuses, vec![200, 200, 429]);
    }

    #[tokio::test]
    async fn create_assigns_caller_as_owner() {
        let (state, created) = fixture();
        let res = warp::test::request()
            .method("POST")
            .path("/profiles")
            .header("authorization", format!("Bearer {TOKEN}"))
            .json(&ProfilePatch::new().title("Second page"))
            .reply(&routes(state.clone()))
            .await;

        assert_eq!(res.status(), 201);
        let profile: Profile = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(profile.owner, created.owner);
        assert_eq!(profile.title, "Second page");
        assert_eq!(state.store.len(), 2);
    }
}
