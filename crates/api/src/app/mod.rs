//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store wiring (one synchronizer per entity kind, workers)
//! - `routes/`: HTTP routes + handlers (generic resource routes, admin/system)
//! - `dto.rs`: query/response DTOs and alert headers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Router};
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<services::AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", routes::router(services))
        .layer(middleware::http_trace())
}
