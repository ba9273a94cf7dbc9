//! Audit recorder: one immutable audit row per guarded request.
//!
//! Installed as a route layer inside the authorization gates, so it wraps
//! exactly the handler. Nothing is written before the handler runs; after it
//! returns (any status) the row is built and handed to a spawned task. The
//! response never waits for the write, and a failed write is only logged.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{ConnectInfo, Path, Request, State},
    http::HeaderMap,
    middleware::{Next, from_fn_with_state},
    response::Response,
};
use serde_json::json;
use uuid::Uuid;

use lexdesk_history::{AuditRecord, AuditStore};

use crate::context::{CurrentUser, request_path};

/// Per-route-group audit settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
    pub entity_type: String,
    /// Replaces the HTTP method as the recorded action.
    pub action: Option<String>,
    /// Take the client address from `X-Forwarded-For` instead of the peer.
    pub trust_forwarded_for: bool,
}

impl AuditConfig {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            action: None,
            trust_forwarded_for: false,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn trusting_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }
}

#[derive(Clone)]
pub struct AuditState {
    pub store: Arc<dyn AuditStore>,
    pub config: AuditConfig,
}

/// Wrap every route of `router` with the audit recorder.
pub fn audited<S>(router: Router<S>, store: Arc<dyn AuditStore>, config: AuditConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(from_fn_with_state(AuditState { store, config }, record_audit))
}

pub async fn record_audit(
    State(state): State<AuditState>,
    params: Option<Path<HashMap<String, String>>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    req: Request,
    next: Next,
) -> Response {
    let path = request_path(&req);
    let method = req.method().as_str().to_string();
    let actor = req.extensions().get::<CurrentUser>().map(CurrentUser::id);
    let forwarded = state.config.trust_forwarded_for.then(|| req.headers());
    let ip = client_ip(forwarded, connect_info.map(|ConnectInfo(addr)| addr));
    let entity_id = params
        .and_then(|Path(mut p)| p.remove("id"))
        .unwrap_or_else(|| Uuid::now_v7().to_string());

    let response = next.run(req).await;

    let record = AuditRecord::new(
        actor,
        state.config.entity_type.clone(),
        entity_id,
        state.config.action.clone().unwrap_or(method),
        json!({ "path": path, "status": response.status().as_u16() }),
        ip,
    );
    let store = state.store.clone();
    tokio::spawn(async move {
        if let Err(err) = store.append(record).await {
            tracing::error!(error = %err, "failed to write audit record");
        }
    });

    response
}

/// First `X-Forwarded-For` hop when the proxy is trusted, else the peer address.
fn client_ip(forwarded: Option<&HeaderMap>, peer: Option<SocketAddr>) -> Option<String> {
    forwarded
        .and_then(|headers| headers.get("x-forwarded-for"))
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}
