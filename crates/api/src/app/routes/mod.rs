use axum::{Router, routing::get};

use crate::app::services::AppServices;

pub mod admin;
pub mod applications;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router(services: &AppServices) -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/menu", get(system::menu))
        .route("/permissions/check", get(system::check_permission))
        .nest("/applications", applications::router(services))
        .nest("/admin", admin::router(services))
}
