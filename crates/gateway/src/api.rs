//! Request handlers and wire types.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, info_span};

use linkwise_core::{Contact, Error, IdentifyResponse};

use crate::SharedState;
use crate::error::ApiError;

/// `POST /identify` body. Both fields may be absent, null, or empty; at
/// least one must carry a value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<PhoneNumber>,
}

/// Phone numbers arrive as strings or as bare JSON numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PhoneNumber {
    Text(String),
    Number(serde_json::Number),
}

impl PhoneNumber {
    pub fn into_string(self) -> String {
        match self {
            PhoneNumber::Text(text) => text,
            PhoneNumber::Number(number) => number.to_string(),
        }
    }
}

pub(crate) async fn identify_handler(
    State(state): State<SharedState>,
    payload: Result<Json<IdentifyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IdentifyResponse>), ApiError> {
    let Json(request) = payload?;
    let observation = state.rules.observe(
        request.email,
        request.phone_number.map(PhoneNumber::into_string),
    )?;

    let request_id = uuid::Uuid::new_v4();
    let span = info_span!("reconcile", %request_id);
    let reconciler = state.reconciler.clone();

    // Detached so a dropped connection cannot abort a reconciliation half way.
    let outcome = tokio::spawn(async move { reconciler.reconcile(observation).await }.instrument(span))
        .await
        .map_err(|e| Error::Infrastructure {
            message: format!("reconciliation task failed: {e}"),
            transient: false,
        })??;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome.view.into())))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContactListResponse {
    pub contacts: Vec<Contact>,
    pub count: usize,
}

pub(crate) async fn contacts_handler(
    State(state): State<SharedState>,
) -> Result<Json<ContactListResponse>, ApiError> {
    let contacts = state
        .reconciler
        .store()
        .list_all()
        .await
        .map_err(Error::from)?;
    Ok(Json(ContactListResponse {
        count: contacts.len(),
        contacts,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store: String,
}

pub(crate) async fn health_handler(State(state): State<SharedState>) -> Response {
    let store = state.reconciler.store();
    let (code, status) = match store.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!(error = %e, "Store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    };
    let body = HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: store.name().to_string(),
    };
    (code, Json(body)).into_response()
}
