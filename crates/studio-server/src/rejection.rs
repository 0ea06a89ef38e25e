//! Error envelope at the route boundary
//!
//! Handlers reject with [`Rejected`]; [`handle_rejection`] turns every
//! rejection, including warp's built-in ones, into the JSON envelope with the
//! matching status.

use std::convert::Infallible;
use studio_core::ApiError;
use tracing::{debug, error};
use warp::http::StatusCode;
use warp::{Rejection, Reply};

/// Taxonomy error carried through warp's rejection system
#[derive(Debug)]
pub struct Rejected(pub ApiError);

impl warp::reject::Reject for Rejected {}

/// Reject with a taxonomy error
#[must_use]
pub fn reject(error: ApiError) -> Rejection {
    warp::reject::custom(Rejected(error))
}

/// Map any rejection to an enveloped error response
///
/// # Errors
/// Never; the signature is what `Filter::recover` expects
pub async fn handle_rejection(rejection: Rejection) -> Result<impl Reply, Infallible> {
    let api_error = classify(&rejection);
    Ok(error_reply(&api_error))
}

fn classify(rejection: &Rejection) -> ApiError {
    if let Some(Rejected(error)) = rejection.find::<Rejected>() {
        return error.clone();
    }
    if let Some(e) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        return ApiError::validation(format!("invalid JSON body: {e}"));
    }
    if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        return ApiError::validation("request body too large");
    }
    if rejection.find::<warp::reject::UnsupportedMediaType>().is_some() {
        return ApiError::validation("expected an application/json body");
    }
    if rejection.find::<warp::reject::LengthRequired>().is_some() {
        return ApiError::validation("content-length required");
    }
    if rejection.is_not_found() || rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        return ApiError::NotFound {
            resource: "route".to_string(),
            id: String::new(),
        };
    }

    ApiError::Internal(format!("unhandled rejection: {rejection:?}"))
}

/// Enveloped JSON response for an error
#[must_use]
pub fn error_reply(api_error: &ApiError) -> warp::reply::Response {
    if api_error.is_client_error() {
        debug!(code = api_error.code(), error = %api_error, "request rejected");
    } else {
        error!(code = api_error.code(), error = %api_error, "request failed");
    }

    let status = StatusCode::from_u16(api_error.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = warp::reply::json(&api_error.envelope());
    let mut response = warp::reply::with_status(body, status).into_response();

    if let ApiError::RateLimited { retry_after_secs } = api_error {
        if let Ok(value) = warp::http::HeaderValue::from_str(&retry_after_secs.to_string()) {
            response.headers_mut().insert(warp::http::header::RETRY_AFTER, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_sets_retry_after() {
        let response = error_reply(&ApiError::RateLimited {
            retry_after_secs: 7,
        });

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[warp::http::header::RETRY_AFTER], "7");
    }

    #[test]
    fn statuses_follow_taxonomy() {
        let cases = [
            (ApiError::validation("x"), 400),
            (ApiError::Authentication("x".into()), 401),
            (ApiError::Authorization("x".into()), 403),
            (ApiError::Conflict("x".into()), 409),
            (ApiError::Internal("x".into()), 500),
        ];
        for (error, status) in cases {
            assert_eq!(error_reply(&error).status().as_u16(), status);
        }
    }

    #[test]
    fn custom_rejection_is_found() {
        let rejection = reject(ApiError::Conflict("dup".into()));
        assert_eq!(classify(&rejection), ApiError::Conflict("dup".into()));
        assert_eq!(classify(&warp::reject::not_found()).status(), 404);
    }
}
