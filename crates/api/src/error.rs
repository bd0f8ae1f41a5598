use axum::http::{header, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use hivejar_control::ControlError;
use serde::{Deserialize, Serialize};

/// Wire shape for every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(code: &str, detail: &str) -> Self {
        Self {
            code: code.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// Structured API error: a status, a stable code string, and an optional
/// Retry-After hint.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
    pub retry_after: Option<u32>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, detail: &str) -> Self {
        Self {
            status,
            body: ErrorResponse::new(code, detail),
            retry_after: None,
        }
    }

    pub fn precondition_required() -> Self {
        Self::new(
            StatusCode::PRECONDITION_REQUIRED,
            "precondition_required",
            "If-Match header is required",
        )
    }

    pub fn payload_too_large(limit: usize) -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "payload_too_large",
            &format!("payload exceeds {} bytes", limit),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let mut response = (self.status, Json(self.body)).into_response();
        if let Some(seconds) = self.retry_after {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from_str(&seconds.to_string()).expect("numeric header"),
            );
        }
        response
    }
}

/// Map the control-plane taxonomy onto fixed statuses and stable codes.
/// No message inspection: the kind decides everything.
impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        match &err {
            ControlError::InvalidInput(detail) => {
                ApiError::new(StatusCode::BAD_REQUEST, "invalid_input", detail)
            }
            ControlError::NotFound(what) => {
                ApiError::new(StatusCode::NOT_FOUND, "not_found", what)
            }
            ControlError::AlreadyExists(what) => {
                ApiError::new(StatusCode::CONFLICT, "already_exists", what)
            }
            ControlError::Conflict(detail) => {
                ApiError::new(StatusCode::CONFLICT, "conflict", detail)
            }
            ControlError::PreconditionFailed => ApiError::new(
                StatusCode::PRECONDITION_FAILED,
                "precondition_failed",
                "settings changed since read",
            ),
            ControlError::NotLeader { leader_id } => {
                let detail = match leader_id {
                    Some(id) => format!("not leader (leader: {})", id),
                    None => "not leader".to_string(),
                };
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", &detail)
            }
            ControlError::NoDbForTenant(slug) => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "no_database",
                &format!("tenant '{}' has no usable database", slug),
            ),
            ControlError::NotSupported(detail) => {
                ApiError::new(StatusCode::NOT_IMPLEMENTED, "not_supported", detail)
            }
            ControlError::LockBusy(slug) => {
                let mut api = ApiError::new(
                    StatusCode::CONFLICT,
                    "migration_in_progress",
                    &format!("another migration is running for tenant '{}'", slug),
                );
                api.retry_after = Some(5);
                api
            }
            ControlError::CryptoIntegrity | ControlError::CryptoFormat(_) => {
                // Log the cause server-side, never echo crypto details.
                tracing::error!("Crypto failure: {}", err);
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", "internal error")
            }
            ControlError::ServiceUnavailable(detail) => {
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", detail)
            }
            ControlError::Canceled => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "canceled",
                "request canceled",
            ),
            ControlError::DeadlineExceeded => ApiError::new(
                StatusCode::GATEWAY_TIMEOUT,
                "deadline_exceeded",
                "operation timed out",
            ),
            ControlError::Internal(cause) => {
                tracing::error!("Internal error: {}", cause);
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", "internal error")
            }
        }
    }
}
