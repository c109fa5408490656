//! Shared Cart API 模块

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/cart", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route(
            "/items/{id}",
            get(handler::get_item)
                .patch(handler::update_quantity)
                .delete(handler::remove_item),
        )
        .route("/{session_id}", get(handler::get_cart))
        .route("/{session_id}/items", post(handler::add_item))
        .route("/{session_id}/submit", post(handler::submit))
}
