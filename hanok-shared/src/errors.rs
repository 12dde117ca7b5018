use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{module}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Auth errors
/// - E2xxx: Resident errors
/// - E3xxx: Complaint errors
/// - E4xxx: Notice errors
/// - E5xxx: Poll errors
/// - E6xxx: Notification errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    BadRequest,
    ServiceUnavailable,

    // Auth (E1xxx)
    InvalidCredentials,
    TokenExpired,
    TokenInvalid,
    SignupPending,
    AccountInactive,

    // Resident (E2xxx)
    ResidentNotFound,
    ResidentNotRegistered,
    ApartmentNotFound,

    // Complaint (E3xxx)
    ComplaintNotFound,

    // Notice (E4xxx)
    NoticeNotFound,

    // Poll (E5xxx)
    PollNotFound,
    PollClosed,

    // Notification (E6xxx)
    NotificationNotFound,
    NotificationForbidden,
    NotificationUpdateConflict,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::BadRequest => "E0006",
            Self::ServiceUnavailable => "E0007",

            // Auth
            Self::InvalidCredentials => "E1001",
            Self::TokenExpired => "E1002",
            Self::TokenInvalid => "E1003",
            Self::SignupPending => "E1004",
            Self::AccountInactive => "E1005",

            // Resident
            Self::ResidentNotFound => "E2001",
            Self::ResidentNotRegistered => "E2002",
            Self::ApartmentNotFound => "E2003",

            // Complaint
            Self::ComplaintNotFound => "E3001",

            // Notice
            Self::NoticeNotFound => "E4001",

            // Poll
            Self::PollNotFound => "E5001",
            Self::PollClosed => "E5002",

            // Notification
            Self::NotificationNotFound => "E6001",
            Self::NotificationForbidden => "E6002",
            Self::NotificationUpdateConflict => "E6003",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError
            | Self::ServiceUnavailable
            | Self::NotificationUpdateConflict => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError | Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::NotFound
            | Self::ResidentNotFound
            | Self::ApartmentNotFound
            | Self::ComplaintNotFound
            | Self::NoticeNotFound
            | Self::PollNotFound
            | Self::NotificationNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized
            | Self::InvalidCredentials
            | Self::TokenExpired
            | Self::TokenInvalid => StatusCode::UNAUTHORIZED,
            Self::Forbidden
            | Self::SignupPending
            | Self::AccountInactive
            | Self::ResidentNotRegistered
            | Self::NotificationForbidden => StatusCode::FORBIDDEN,
            Self::PollClosed => StatusCode::CONFLICT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// The code of a `Known` error, if any. Used by tests and by callers
    /// that branch on the taxonomy rather than the HTTP mapping.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Known { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new("E0003", "resource not found"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "database error"),
                    ),
                }
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
