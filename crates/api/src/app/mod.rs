//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store wiring (identity, audit, timeline)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};

use lexdesk_auth::{Hs256JwtValidator, JwtValidator};
use lexdesk_infra::AppConfig;

use crate::middleware::{self, AuthState};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router from configuration (entrypoint used by `main.rs`).
pub async fn build_app(config: &AppConfig) -> anyhow::Result<Router> {
    let services = Arc::new(services::build_services(config).await?);
    let jwt: Arc<dyn JwtValidator> = Arc::new(Hs256JwtValidator::new(config.jwt_secret.as_bytes()));
    let auth = AuthState {
        jwt: Some(jwt),
        identity: services.identity.clone(),
        legacy_token: config.legacy_token.clone(),
    };
    Ok(router(services, auth))
}

/// Assemble the router around already-built services.
pub fn router(services: Arc<AppServices>, auth: AuthState) -> Router {
    // Protected routes: authentication first, then per-group gates and audit.
    let protected = routes::router(&services)
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(auth, middleware::auth_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
}
