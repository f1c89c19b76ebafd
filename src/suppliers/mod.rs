use axum::{routing::get, Router};

use crate::state::AppState;

pub mod dto;
pub mod handlers;
pub mod repo;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/suppliers",
            get(handlers::list_suppliers).post(handlers::create_supplier),
        )
        .route(
            "/suppliers/:supplier_id",
            get(handlers::get_supplier)
                .patch(handlers::update_supplier)
                .delete(handlers::delete_supplier),
        )
}
