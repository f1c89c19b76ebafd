use axum::{
    routing::{get, patch},
    Router,
};

use crate::state::AppState;

pub mod dto;
pub mod handlers;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(handlers::list_users))
        .route(
            "/users/profile",
            get(handlers::get_profile).patch(handlers::update_profile),
        )
        .route(
            "/users/:user_id",
            get(handlers::get_user).delete(handlers::delete_user),
        )
        .route("/users/:user_id/update-role", patch(handlers::update_role))
}
