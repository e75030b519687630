//! HAL resource routes. Paths are parameterized; handlers resolve the entity by its path segment.

use crate::handlers::{association, entity, root};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(root::index))
        .route("/:repository", get(entity::list).post(entity::create))
        .route(
            "/:repository/:id",
            get(entity::read)
                .put(entity::replace)
                .patch(entity::patch)
                .delete(entity::delete),
        )
        .route(
            "/:repository/:id/:property",
            get(association::read)
                .put(association::replace)
                .post(association::add)
                .delete(association::clear),
        )
        .route(
            "/:repository/:id/:property/:property_id",
            get(association::read_item).delete(association::remove_item),
        )
        .with_state(state)
}
