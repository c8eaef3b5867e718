//! HTTP handlers for the admission check endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::ratelimit::{AdmissionBackend, Decision};

/// Body of a `POST /check` request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckRequest {
    /// Identifier whose quota is checked
    #[serde(default)]
    pub id: Option<String>,
}

/// Build the router exposing `POST /check` over the given backend.
pub fn router<B: AdmissionBackend + 'static>(backend: Arc<B>) -> Router {
    Router::new()
        .route("/check", post(check::<B>))
        .with_state(backend)
}

/// Decide whether the caller identified in the body may proceed.
///
/// Answers `200 OK` when admitted and `429 Too Many Requests` with a
/// `Retry-After` header (whole seconds) when the quota is used up. A missing
/// or blank id is rejected with `400` before any quota is touched.
#[instrument(
    skip(state, body),
    fields(id = body.id.as_deref().unwrap_or_default())
)]
async fn check<B: AdmissionBackend>(
    state: State<Arc<B>>,
    body: Json<CheckRequest>,
) -> Response {
    let State(backend) = state;
    let Json(request) = body;

    let id = match request.id.as_deref() {
        Some(id) if !id.trim().is_empty() => id,
        _ => {
            warn!("Received check request without an id");
            return (StatusCode::BAD_REQUEST, "Id is Required").into_response();
        }
    };

    let decision = backend.check(id).await;

    info!(id = %id, allowed = decision.is_allowed(), "Admission decision made");

    match decision {
        Decision::Allowed => StatusCode::OK.into_response(),
        Decision::Denied { retry_after } => (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_after_secs(retry_after).to_string())],
        )
            .into_response(),
    }
}

/// Whole seconds for a `Retry-After` header, rounded up.
fn retry_after_secs(wait: Duration) -> u64 {
    wait.as_secs() + u64::from(wait.subsec_nanos() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{AdmissionService, FixedWindowStore, Policy, PolicyHandle};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_router(limit: u64) -> Router {
        let store = Arc::new(FixedWindowStore::new());
        let policy = PolicyHandle::new(Policy::new(limit, Duration::from_secs(60)));
        router(Arc::new(AdmissionService::new(store, policy)))
    }

    fn check_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/check")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_secs(60)), 60);
        assert_eq!(retry_after_secs(Duration::from_millis(1500)), 2);
        assert_eq!(retry_after_secs(Duration::from_millis(100)), 1);
    }

    #[tokio::test]
    async fn test_allowed_returns_ok() {
        let app = test_router(1);

        let response = app
            .oneshot(check_request(r#"{"id":"client-1"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }

    #[tokio::test]
    async fn test_denied_returns_retry_after() {
        let app = test_router(1);

        let first = app
            .clone()
            .oneshot(check_request(r#"{"id":"client-1"}"#))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(check_request(r#"{"id":"client-1"}"#))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers()[header::RETRY_AFTER], "60");
    }

    #[tokio::test]
    async fn test_missing_id_rejected() {
        let app = test_router(1);

        let response = app.oneshot(check_request("{}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_blank_id_rejected_without_consuming() {
        let store = Arc::new(FixedWindowStore::new());
        let policy = PolicyHandle::new(Policy::new(1, Duration::from_secs(60)));
        let app = router(Arc::new(AdmissionService::new(Arc::clone(&store), policy)));

        let response = app
            .oneshot(check_request(r#"{"id":"   "}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_json_rejected() {
        let app = test_router(1);

        let response = app.oneshot(check_request("not json")).await.unwrap();
        assert!(response.status().is_client_error());
    }
}
