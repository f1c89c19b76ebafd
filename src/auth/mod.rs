use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod oauth;
pub mod password;
pub mod repo;
pub mod tokens;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route(
            "/auth/resend-email-verification",
            post(handlers::resend_email_verification),
        )
        .route("/auth/verify-email/:token", get(handlers::verify_email))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/refresh-token", post(handlers::refresh_token))
        .route("/auth/forgot-password", post(handlers::forgot_password))
        .route("/auth/reset-password/:token", post(handlers::reset_password))
        .route("/auth/google", get(oauth::google_redirect))
        .route("/auth/google/callback", get(oauth::google_callback))
}
