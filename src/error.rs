use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Conflict(&'static str, String),
    Internal(String),
}

impl ApiError {
    pub fn session_expired() -> Self {
        ApiError::Unauthorized("SESSION_EXPIRED", "Session expired".into())
    }

    pub fn slot_taken() -> Self {
        ApiError::Conflict(
            "SLOT_TAKEN",
            "This time slot is no longer available".into(),
        )
    }

    pub fn duplicate_appointment() -> Self {
        ApiError::Conflict(
            "DUPLICATE_APPOINTMENT",
            "An active appointment of this verification type already exists".into(),
        )
    }

    pub fn appointment_not_found() -> Self {
        ApiError::NotFound("NOT_FOUND", "appointment not found".into())
    }

    pub fn db(e: sqlx::Error) -> Self {
        ApiError::Internal(format!("db error: {e}"))
    }

    fn to_error_response(code: &str, message: &str) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
            },
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(code, msg) => {
                (StatusCode::UNAUTHORIZED, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Forbidden(code, msg) => {
                (StatusCode::FORBIDDEN, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::BadRequest(code, msg) => {
                (StatusCode::BAD_REQUEST, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::NotFound(code, msg) => {
                (StatusCode::NOT_FOUND, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Conflict(code, msg) => {
                (StatusCode::CONFLICT, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::to_error_response("INTERNAL", &msg),
            )
                .into_response(),
        }
    }
}

/// Map a failed appointment write to the outward error. A unique violation on
/// one of the partial indexes means this request lost the race between the
/// availability pre-check and the insert; the constraint is the real guard.
pub fn map_write_error(e: sqlx::Error) -> ApiError {
    if let sqlx::Error::Database(db) = &e {
        match db.constraint() {
            Some("uq_appointment_active_slot") => return ApiError::slot_taken(),
            Some("uq_appointment_active_user_type") => return ApiError::duplicate_appointment(),
            _ => {}
        }
    }
    ApiError::db(e)
}
