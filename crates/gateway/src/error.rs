//! Mapping from domain errors to HTTP responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use linkwise_core::{Error, ErrorClass};

/// Body of every non-2xx response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// `"fail"` when the caller should change the request, `"error"` otherwise.
    pub status: String,
    pub message: String,
}

/// An error on its way out of a handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    class: ErrorClass,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            status,
            class,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let class = err.class();
        match &err {
            Error::Validation(reason) => Self::new(StatusCode::BAD_REQUEST, class, reason.clone()),
            Error::Conflict(reason) => {
                warn!(%reason, "Reconciliation gave up after repeated conflicts");
                Self::new(
                    StatusCode::CONFLICT,
                    class,
                    "contact is being updated concurrently, retry the request",
                )
            }
            Error::Infrastructure {
                transient: true, ..
            } => {
                error!(error = %err, "Contact store unavailable");
                Self::new(StatusCode::SERVICE_UNAVAILABLE, class, "contact store unavailable")
            }
            Error::NotFound(_) | Error::Infrastructure { .. } | Error::Config { .. } => {
                error!(error = %err, "Request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, class, "internal server error")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        Self::new(status, ErrorClass::Client, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.class {
            ErrorClass::Client => "fail",
            ErrorClass::Server => "error",
        };
        let body = ErrorBody {
            status: status.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
