use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};

use crate::app::services::AppServices;

pub mod resources;
pub mod system;

/// Router for everything under `/api`.
pub fn router(services: Arc<AppServices>) -> Router {
    Router::new()
        .merge(resources::router(services.billing_addresses.clone()))
        .merge(resources::router(services.shipping_addresses.clone()))
        .merge(resources::router(services.carts.clone()))
        .merge(resources::router(services.cart_products.clone()))
        .merge(resources::router(services.orders.clone()))
        .merge(resources::router(services.order_products.clone()))
        .merge(resources::router(services.products.clone()))
        .merge(resources::router(services.product_lists.clone()))
        .merge(resources::router(services.product_list_products.clone()))
        .merge(resources::router(services.wishlists.clone()))
        .route("/_admin/index-sync", get(system::index_sync))
        .route("/_admin/reindex", post(system::reindex))
        .layer(Extension(services))
}
