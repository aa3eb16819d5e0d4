use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pomo_core::PomoError;

/// Body used for both missing and foreign tasks, so a caller cannot tell them apart.
pub const TASK_NOT_FOUND: &str = "task not found";

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(PomoError::Validation(msg.into()).into())
    }

    pub fn join(e: tokio::task::JoinError) -> Self {
        Self(anyhow::anyhow!("task join error: {e}"))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PomoError> for AppError {
    fn from(err: PomoError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let Some(e) = self.0.downcast_ref::<PomoError>() else {
            tracing::error!(error = %self.0, "request failed");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
        };

        match e {
            PomoError::Validation(_) | PomoError::InvalidMode(_) => {
                json_error(StatusCode::BAD_REQUEST, &e.to_string())
            }
            PomoError::TaskNotFound(_) | PomoError::TaskForbidden(_) => {
                json_error(StatusCode::NOT_FOUND, TASK_NOT_FOUND)
            }
            PomoError::Unauthenticated => json_error(StatusCode::UNAUTHORIZED, "unauthenticated"),
            PomoError::Unauthorized => json_error(StatusCode::FORBIDDEN, "unauthorized"),
            PomoError::TransientStore(_) => {
                json_error(StatusCode::SERVICE_UNAVAILABLE, "store temporarily unavailable")
            }
            PomoError::NotInitialized
            | PomoError::EmailTaken(_)
            | PomoError::Io(_)
            | PomoError::Yaml(_)
            | PomoError::Json(_) => {
                tracing::error!(error = %e, "request failed");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        }
    }
}

pub fn json_error(status: StatusCode, message: &str) -> Response {
    let body = serde_json::json!({ "error": message });
    (status, axum::Json(body)).into_response()
}
