//! Authorization gate for permission-gated route groups.
//!
//! A [`PermissionGate`] is a plain configuration value naming the permission
//! a route group requires. [`guard`] installs one or more gates as route
//! layers; they run after the authentication gate, in declared order, and
//! the first failure wins.

use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{Next, from_fn_with_state},
    response::Response,
};

use lexdesk_auth::{Permission, authorize};

use crate::app::errors::gate_error;
use crate::context::{CurrentUser, request_path};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGate {
    required: Permission,
}

impl PermissionGate {
    pub fn new(required: Permission) -> Self {
        Self { required }
    }

    pub fn required(&self) -> &Permission {
        &self.required
    }
}

/// Apply `gates` to every route of `router`, checked in the given order.
pub fn guard<S>(router: Router<S>, gates: impl IntoIterator<Item = PermissionGate>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let gates: Vec<PermissionGate> = gates.into_iter().collect();
    // The last route layer added runs first.
    gates
        .into_iter()
        .rev()
        .fold(router, |router, gate| router.route_layer(from_fn_with_state(gate, require_permission)))
}

pub async fn require_permission(State(gate): State<PermissionGate>, req: Request, next: Next) -> Response {
    let path = request_path(&req);

    let Some(user) = req.extensions().get::<CurrentUser>() else {
        tracing::warn!(%path, "authorization gate reached without an authenticated user");
        return forbidden(&path);
    };

    if let Err(err) = authorize(&user.permissions, gate.required()) {
        // The required key is logged, never returned.
        tracing::warn!(%path, user_id = %user.id(), reason = %err, "request forbidden");
        return forbidden(&path);
    }

    next.run(req).await
}

fn forbidden(path: &str) -> Response {
    gate_error(StatusCode::FORBIDDEN, "Forbidden", path)
}
