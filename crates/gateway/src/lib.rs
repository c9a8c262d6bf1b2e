//! HTTP API gateway for Linkwise.
//!
//! Exposes the identify endpoint plus administrative listing and health
//! checks. Built on Axum; every reconciliation runs on its own task inside a
//! `reconcile` span tagged with a fresh request id.

pub mod api;
pub mod error;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{Method, header};
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use linkwise_config::AppConfig;
use linkwise_core::{ContactStore, ValidationRules};
use linkwise_engine::Reconciler;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub reconciler: Arc<Reconciler>,
    pub rules: ValidationRules,
    pub body_limit_bytes: usize,
}

impl GatewayState {
    /// Wire a store into a reconciler configured from `config`.
    pub fn new(store: Arc<dyn ContactStore>, config: &AppConfig) -> Self {
        Self {
            reconciler: Arc::new(Reconciler::from_config(store, &config.reconcile)),
            rules: config.validation.rules(),
            body_limit_bytes: config.gateway.body_limit_bytes,
        }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/identify", post(api::identify_handler))
        .route("/contacts", get(api::contacts_handler))
        .route("/health", get(api::health_handler))
        .layer(DefaultBodyLimit::max(state.body_limit_bytes))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the configured store and serve until Ctrl-C.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let store = linkwise_store::open(&config.store).await?;
    let state = Arc::new(GatewayState::new(store, &config));
    let app = build_router(state);

    info!(addr = %addr, "Gateway listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Could not listen for Ctrl-C; shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ContactListResponse, HealthResponse};
    use crate::error::ErrorBody;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use linkwise_core::{ContactId, IdentifyResponse, Link};
    use linkwise_store::InMemoryStore;
    use tower::ServiceExt;

    fn test_state() -> SharedState {
        Arc::new(GatewayState::new(
            Arc::new(InMemoryStore::new()),
            &AppConfig::default(),
        ))
    }

    async fn identify(state: &SharedState, body: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method("POST")
            .uri("/identify")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = build_router(state.clone()).oneshot(req).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    async fn identify_ok(state: &SharedState, body: &str) -> (StatusCode, IdentifyResponse) {
        let (status, bytes) = identify(state, body).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn identify_err(state: &SharedState, body: &str) -> (StatusCode, ErrorBody) {
        let (status, bytes) = identify(state, body).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state());

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.store, "memory");
        assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn new_identity_is_created() {
        let state = test_state();
        let (status, json) = identify_ok(
            &state,
            r#"{"email": "lorraine@hillvalley.edu", "phoneNumber": "123456"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json.contact.primary_contact_id, ContactId(1));
        assert_eq!(json.contact.emails, vec!["lorraine@hillvalley.edu"]);
        assert_eq!(json.contact.phone_numbers, vec!["123456"]);
        assert!(json.contact.secondary_contact_ids.is_empty());
    }

    #[tokio::test]
    async fn known_identity_returns_ok_with_camel_case_body() {
        let state = test_state();
        identify(&state, r#"{"email": "a@x.com", "phoneNumber": 111}"#).await;
        let (status, bytes) = identify(&state, r#"{"email": "b@x.com", "phoneNumber": 111}"#).await;

        assert_eq!(status, StatusCode::OK);
        let raw: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({
                "contact": {
                    "primaryContactId": 1,
                    "emails": ["a@x.com", "b@x.com"],
                    "phoneNumbers": ["111"],
                    "secondaryContactIds": [2]
                }
            })
        );
    }

    #[tokio::test]
    async fn merge_over_http() {
        let state = test_state();
        identify(&state, r#"{"email": "george@hillvalley.edu", "phoneNumber": "919191"}"#).await;
        identify(&state, r#"{"email": "biffsucks@hillvalley.edu", "phoneNumber": "717171"}"#).await;

        let (status, json) = identify_ok(
            &state,
            r#"{"email": "george@hillvalley.edu", "phoneNumber": "717171"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.contact.primary_contact_id, ContactId(1));
        assert_eq!(json.contact.phone_numbers, vec!["919191", "717171"]);
        assert_eq!(json.contact.secondary_contact_ids, vec![ContactId(2)]);
    }

    #[tokio::test]
    async fn whitespace_and_empty_fields_are_normalized() {
        let state = test_state();
        let (status, json) =
            identify_ok(&state, r#"{"email": "  a@x.com ", "phoneNumber": ""}"#).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json.contact.emails, vec!["a@x.com"]);
        assert!(json.contact.phone_numbers.is_empty());
    }

    #[tokio::test]
    async fn empty_observation_is_a_client_failure() {
        let state = test_state();
        for body in [r#"{}"#, r#"{"email": null, "phoneNumber": null}"#, r#"{"email": "  "}"#] {
            let (status, err) = identify_err(&state, body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
            assert_eq!(err.status, "fail");
            assert!(err.message.contains("required"));
        }
    }

    #[tokio::test]
    async fn malformed_values_are_rejected() {
        let state = test_state();
        for body in [
            r#"{"email": "not-an-email"}"#,
            r#"{"phoneNumber": "12ab"}"#,
            r#"{"phoneNumber": "12"}"#,
            r#"{"phoneNumber": -5}"#,
        ] {
            let (status, err) = identify_err(&state, body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
            assert_eq!(err.status, "fail");
        }
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let state = test_state();
        let (status, err) = identify_err(&state, r#"{"email": "#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err.status, "fail");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let mut config = AppConfig::default();
        config.gateway.body_limit_bytes = 32;
        let state = Arc::new(GatewayState::new(Arc::new(InMemoryStore::new()), &config));

        let padding = "x".repeat(64);
        let (status, _) = identify(
            &state,
            &format!(r#"{{"email": "a@x.com", "pad": "{padding}"}}"#),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn contacts_lists_every_row() {
        let state = test_state();
        identify(&state, r#"{"email": "a@x.com", "phoneNumber": "111"}"#).await;
        identify(&state, r#"{"email": "b@x.com", "phoneNumber": "111"}"#).await;

        let req = Request::builder()
            .uri("/contacts")
            .body(Body::empty())
            .unwrap();
        let response = build_router(state).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let list: ContactListResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(list.count, 2);
        assert!(list.contacts[0].is_primary());
        assert_eq!(
            list.contacts[1].link,
            Link::Secondary {
                linked_id: ContactId(1)
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_agree_on_primary() {
        let state = test_state();
        let calls = (0..8).map(|_| {
            let state = state.clone();
            async move { identify_ok(&state, r#"{"email": "same@x.com"}"#).await }
        });
        let results = futures::future::join_all(calls).await;

        let created = results.iter().filter(|(s, _)| *s == StatusCode::CREATED).count();
        assert_eq!(created, 1);
        assert!(
            results
                .iter()
                .all(|(_, r)| r.contact.primary_contact_id == ContactId(1))
        );
    }
}
