//! Authentication gate.
//!
//! Resolves the bearer credential to a live user and publishes a
//! [`CurrentUser`] into the request extensions. Every failure short-circuits
//! with a structured 401.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use thiserror::Error;

use lexdesk_auth::JwtValidator;
use lexdesk_infra::IdentityStore;

use crate::app::errors::gate_error;
use crate::context::{CurrentUser, request_path};

/// Why a request was not authenticated. `Display` is the wire message.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthnError {
    #[error("Authorization header missing")]
    MissingCredential,

    #[error("Invalid token format. Expected: Bearer <token>")]
    BadFormat,

    /// No signing secret, or the identity store could not be reached.
    #[error("Authentication unavailable")]
    ServerMisconfigured,

    /// Bad signature, malformed token, time window failure, or a subject
    /// that is unknown or deleted. Deliberately indistinguishable.
    #[error("Invalid or expired token")]
    InvalidOrExpired,
}

#[derive(Clone)]
pub struct AuthState {
    /// `None` when no signing secret is configured.
    pub jwt: Option<Arc<dyn JwtValidator>>,
    pub identity: Arc<dyn IdentityStore>,
    /// Used only when a request carries no `Authorization` header.
    pub legacy_token: Option<String>,
}

pub async fn auth_middleware(State(state): State<AuthState>, mut req: Request, next: Next) -> Response {
    let path = request_path(&req);

    let outcome = authenticate(&state, req.headers()).await;
    match outcome {
        Ok(current) => {
            req.extensions_mut().insert(current);
            next.run(req).await
        }
        Err(err) => {
            if err == AuthnError::ServerMisconfigured {
                tracing::error!(%path, reason = %err, "authentication unavailable");
            } else {
                tracing::warn!(%path, reason = %err, "request not authenticated");
            }
            gate_error(StatusCode::UNAUTHORIZED, &err.to_string(), &path)
        }
    }
}

async fn authenticate(state: &AuthState, headers: &HeaderMap) -> Result<CurrentUser, AuthnError> {
    let token = match headers.get(header::AUTHORIZATION) {
        Some(value) => extract_bearer(value.to_str().map_err(|_| AuthnError::BadFormat)?)?,
        None => state
            .legacy_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(AuthnError::MissingCredential)?
            .trim(),
    };

    let jwt = state.jwt.as_ref().ok_or(AuthnError::ServerMisconfigured)?;
    let claims = jwt.validate(token, Utc::now()).map_err(|e| {
        tracing::debug!(error = %e, "token rejected");
        AuthnError::InvalidOrExpired
    })?;

    let user = state
        .identity
        .user(claims.sub)
        .await
        .map_err(store_unavailable)?
        .ok_or(AuthnError::InvalidOrExpired)?;
    let roles = state.identity.roles_for_user(user.id).await.map_err(store_unavailable)?;
    let permissions = state
        .identity
        .effective_permissions(user.id)
        .await
        .map_err(store_unavailable)?;

    Ok(CurrentUser {
        user,
        roles,
        permissions,
    })
}

fn store_unavailable(err: lexdesk_infra::IdentityError) -> AuthnError {
    tracing::error!(error = %err, "identity lookup failed during authentication");
    AuthnError::ServerMisconfigured
}

fn extract_bearer(header: &str) -> Result<&str, AuthnError> {
    let token = header.strip_prefix("Bearer ").ok_or(AuthnError::BadFormat)?.trim();
    if token.is_empty() {
        return Err(AuthnError::BadFormat);
    }
    Ok(token)
}
