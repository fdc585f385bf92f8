use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;

use crate::services::admission::AdmissionError;
use crate::services::lifecycle::LifecycleError;
use crate::store::StoreError;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `TOKEN_MISSING`,
    /// `TOKEN_INVALID`, `PERMISSION_DENIED`, `NOT_FOUND`, `CONFLICT`,
    /// `STATE_CONFLICT`, `EVENT_NOT_ACTIVE`, `NOT_PARTICIPATING`,
    /// `SUBMISSION_LIMIT_REACHED`, `PROOF_REQUIRED`, `INVALID_TIME_FORMAT`,
    /// `REGION_MISMATCH`, `INTERNAL_ERROR`.
    #[schema(example = "INVALID_TIME_FORMAT")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "Invalid time format '1:2.45'. Use M:SS.mmm")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    TokenMissing,
    TokenInvalid,
    PermissionDenied,
    NotFound(String),
    Conflict(String),
    /// A transition attempted from a state that does not allow it.
    StateConflict(String),
    /// Submission refused by admission control.
    Admission {
        code: &'static str,
        message: String,
    },
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_MISSING",
                    message: "Authentication required".into(),
                },
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_INVALID",
                    message: "Invalid or expired token".into(),
                },
            ),
            AppError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "PERMISSION_DENIED",
                    message: "Insufficient permissions".into(),
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "CONFLICT",
                    message: msg,
                },
            ),
            AppError::StateConflict(msg) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "STATE_CONFLICT",
                    message: msg,
                },
            ),
            AppError::Admission { code, message } => {
                (StatusCode::BAD_REQUEST, ErrorBody { code, message })
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(format!("{} not found", capitalize(what))),
            StoreError::NotPending(_) | StoreError::Transition(_) | StoreError::EventTransition(_) => {
                AppError::StateConflict(err.to_string())
            }
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::OutOfRange(_) => AppError::Validation(err.to_string()),
            StoreError::NotParticipating
            | StoreError::LimitReached { .. }
            | StoreError::EventClosed
            | StoreError::ProofRequired
            | StoreError::RegionMismatch { .. } => AdmissionError::from(err).into(),
            StoreError::Database(e) => e.into(),
            StoreError::Corrupt(detail) => AppError::Internal(detail),
        }
    }
}

impl From<AdmissionError> for AppError {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::Store(e) => e.into(),
            AdmissionError::InvalidProof(msg) => AppError::Validation(msg),
            other => AppError::Admission {
                code: other.code(),
                message: other.to_string(),
            },
        }
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            e @ LifecycleError::NotReviewer => AppError::StateConflict(e.to_string()),
            LifecycleError::InvalidNotes(msg) => AppError::Validation(msg),
            LifecycleError::Store(e) => e.into(),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
