use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, FieldError};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(mut self) -> Result<Self, AppError> {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self.password = self.password.trim().to_string();

        let mut errors = Vec::new();
        if self.name.is_empty() {
            errors.push(FieldError::new("name", "name is required", ""));
        }
        if self.email.is_empty() {
            errors.push(FieldError::new("email", "email is required", ""));
        } else if !is_valid_email(&self.email) {
            errors.push(FieldError::new(
                "email",
                "invalid email format",
                self.email.as_str(),
            ));
        }
        if self.password.is_empty() {
            errors.push(FieldError::new("password", "password is required", ""));
        } else if self.password.len() < 6 {
            errors.push(FieldError::new(
                "password",
                "password must be at least 6 characters long",
                "",
            ));
        }
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(mut self) -> Result<Self, AppError> {
        self.email = self.email.trim().to_lowercase();
        self.password = self.password.trim().to_string();

        let mut errors = Vec::new();
        if self.email.is_empty() {
            errors.push(FieldError::new("email", "email is required", ""));
        }
        if self.password.is_empty() {
            errors.push(FieldError::new("password", "password is required", ""));
        }
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

/// Refresh rotation accepts the token from the cookie or the body.
#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

impl ForgotPasswordRequest {
    pub fn validate(mut self) -> Result<Self, AppError> {
        self.email = self.email.trim().to_lowercase();
        let mut errors = Vec::new();
        if self.email.is_empty() {
            errors.push(FieldError::new("email", "email is required", ""));
        } else if !is_valid_email(&self.email) {
            errors.push(FieldError::new(
                "email",
                "invalid email format",
                self.email.as_str(),
            ));
        }
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
}

impl ResetPasswordRequest {
    pub fn validate(mut self) -> Result<Self, AppError> {
        self.password = self.password.trim().to_string();
        let mut errors = Vec::new();
        if self.password.is_empty() {
            errors.push(FieldError::new("password", "password is required", ""));
        } else if self.password.len() < 6 {
            errors.push(FieldError::new(
                "password",
                "password must be at least 6 characters long",
                "",
            ));
        }
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

/// Body returned by login and refresh: the access token travels in the JSON
/// body, the refresh token only ever in the cookie.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "accessToken")]
    pub access_token: String,
}

impl TokenResponse {
    pub fn new(access_token: String, message: Option<&str>) -> Self {
        Self {
            status: "success",
            message: message.map(str::to_string),
            access_token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a b@x.com"));
    }

    #[test]
    fn register_trims_and_lowercases() {
        let req = RegisterRequest {
            name: "  Alice ".into(),
            email: " A@X.Com ".into(),
            password: "secret1".into(),
        }
        .validate()
        .expect("valid request");
        assert_eq!(req.name, "Alice");
        assert_eq!(req.email, "a@x.com");
    }

    #[test]
    fn register_collects_one_error_per_field() {
        let err = RegisterRequest {
            name: "".into(),
            email: "bad".into(),
            password: "abc".into(),
        }
        .validate()
        .unwrap_err();
        match err {
            AppError::Validation(errors) => {
                assert_eq!(errors.len(), 3);
                assert_eq!(errors[0].field, "name");
                assert_eq!(errors[0].message, "name is required");
                assert_eq!(errors[1].field, "email");
                assert_eq!(errors[2].field, "password");
            }
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[test]
    fn short_password_is_rejected() {
        let err = ResetPasswordRequest {
            password: "12345".into(),
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn token_response_uses_camel_case_on_the_wire() {
        let json =
            serde_json::to_string(&TokenResponse::new("abc".into(), Some("logged in"))).unwrap();
        assert!(json.contains("\"accessToken\":\"abc\""));
        assert!(json.contains("\"status\":\"success\""));
    }

    #[test]
    fn refresh_body_field_is_optional() {
        let req: RefreshRequest = serde_json::from_str("{}").expect("empty body");
        assert!(req.refresh_token.is_none());
        let req: RefreshRequest =
            serde_json::from_str(r#"{"refreshToken":"tok"}"#).expect("body with token");
        assert_eq!(req.refresh_token.as_deref(), Some("tok"));
    }
}
