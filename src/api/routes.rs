use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use std::sync::Arc;

use crate::api::handlers;
use crate::store::traits::Store;

pub fn create_router<S: Store + 'static>() -> Router<Arc<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Instance metadata
        .route(
            "/instances/:instance_id/metadata",
            get(handlers::list_metadata::<S>),
        )
        .route(
            "/instances/:instance_id/metadata/:key",
            get(handlers::show_metadata::<S>),
        )
        .route(
            "/instances/:instance_id/metadata/:key",
            post(handlers::create_metadata::<S>),
        )
        .route(
            "/instances/:instance_id/metadata/:key",
            put(handlers::edit_metadata::<S>),
        )
        .route(
            "/instances/:instance_id/metadata/:key",
            patch(handlers::update_metadata::<S>),
        )
        .route(
            "/instances/:instance_id/metadata/:key",
            delete(handlers::delete_metadata::<S>),
        )
}
