use std::sync::OnceLock;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

static EXPOSE_STACK: OnceLock<bool> = OnceLock::new();

/// Set once at startup. Outside production the Debug rendering of the
/// failure rides the response body; production responses never carry it.
pub fn expose_stack(enabled: bool) {
    let _ = EXPOSE_STACK.set(enabled);
}

fn stack_enabled() -> bool {
    EXPOSE_STACK.get().copied().unwrap_or(cfg!(debug_assertions))
}

/// One entry of a per-field validation error list.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub value: String,
}

impl FieldError {
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: value.into(),
        }
    }
}

/// Application failure taxonomy. Every handler returns this; the
/// `IntoResponse` impl is the single place responses are shaped.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Validation Errors")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    Unauthorized(String),

    #[error("token expired")]
    TokenExpired,

    #[error("invalid token please login")]
    TokenInvalid,

    #[error("you do not have permission to perform this action")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{field} already exists")]
    DuplicateField { field: String },

    #[error("failed to send email")]
    MailDispatch(#[source] anyhow::Error),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),

    #[error("Internal Server Error")]
    Database(sqlx::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) | Self::TokenExpired | Self::TokenInvalid => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) | Self::DuplicateField { .. } => StatusCode::CONFLICT,
            Self::MailDispatch(_) | Self::Internal(_) | Self::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn field_errors(&self) -> Option<Vec<FieldError>> {
        match self {
            Self::Validation(errors) => Some(errors.clone()),
            Self::DuplicateField { field } => Some(vec![FieldError::new(
                field.clone(),
                format!("{field} already exists"),
                "",
            )]),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound("resource does not exist".into()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                let field = db
                    .constraint()
                    .and_then(constraint_field)
                    .unwrap_or("value")
                    .to_string();
                Self::DuplicateField { field }
            }
            _ => Self::Database(err),
        }
    }
}

/// Unique indexes follow the `<table>_<column>_key` naming convention; the
/// column part may itself contain underscores.
fn constraint_field(name: &str) -> Option<&str> {
    name.strip_suffix("_key")?
        .split_once('_')
        .map(|(_table, column)| column)
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = ?self, "request failed");
        }
        let stack = stack_enabled().then(|| format!("{self:?}"));
        let body = ErrorBody {
            status: "fail",
            message: self.to_string(),
            errors: self.field_errors(),
            stack,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(
            AppError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Validation(vec![]).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::TokenExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::TokenInvalid.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::MailDispatch(anyhow::anyhow!("smtp down")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn expired_and_invalid_tokens_stay_distinguishable() {
        assert_eq!(AppError::TokenExpired.to_string(), "token expired");
        assert_eq!(
            AppError::TokenInvalid.to_string(),
            "invalid token please login"
        );
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn duplicate_field_names_the_offending_field() {
        let err = AppError::DuplicateField {
            field: "email".into(),
        };
        assert_eq!(err.to_string(), "email already exists");
        let errors = err.field_errors().expect("field errors present");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "email");
    }

    #[test]
    fn internal_errors_hide_their_detail() {
        let err = AppError::Internal(anyhow::anyhow!("connection pool exhausted"));
        assert_eq!(err.to_string(), "Internal Server Error");
    }

    #[test]
    fn constraint_names_yield_the_full_column() {
        assert_eq!(constraint_field("users_email_key"), Some("email"));
        assert_eq!(constraint_field("users_google_id_key"), Some("google_id"));
        assert_eq!(constraint_field("users_pkey"), None);
        assert_eq!(constraint_field("not-a-constraint"), None);
    }

    #[tokio::test]
    async fn production_responses_carry_no_stack() {
        expose_stack(false);
        let resp = AppError::BadRequest("x".into()).into_response();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert!(body.get("stack").is_none());
    }

    #[tokio::test]
    async fn response_body_carries_fail_status_and_message() {
        let resp = AppError::NotFound("user does not exist".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["status"], "fail");
        assert_eq!(body["message"], "user does not exist");
    }
}
