use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use lexdesk_api::app::{self, services::AppServices};
use lexdesk_api::middleware::AuthState;
use lexdesk_auth::{Hs256JwtValidator, JwtClaims, JwtValidator};
use lexdesk_core::UserId;
use lexdesk_history::{AuditFilter, AuditStore};
use lexdesk_infra::{IdentityStore, InMemoryIdentityStore, Seed, seed::SeedUser};

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    identity: Arc<dyn IdentityStore>,
    services: Arc<AppServices>,
    handle: tokio::task::JoinHandle<()>,
}

struct Options {
    secret: Option<&'static str>,
    legacy_token: Option<String>,
    trust_forwarded_for: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            secret: Some(SECRET),
            legacy_token: None,
            trust_forwarded_for: false,
        }
    }
}

fn seed_user(name: &str, email: &str, role: &str) -> SeedUser {
    SeedUser {
        name: name.to_string(),
        email: email.to_string(),
        credential_hash: String::new(),
        roles: vec![role.to_string()],
    }
}

async fn seeded_identity() -> Arc<dyn IdentityStore> {
    let identity: Arc<dyn IdentityStore> = Arc::new(InMemoryIdentityStore::new());
    let mut seed = Seed::default_seed();
    seed.users = vec![
        seed_user("Ada Admin", "admin@firm.example", "admin"),
        seed_user("Lee Lawyer", "lawyer@firm.example", "lawyer"),
        seed_user("Max Mediator", "mediator@firm.example", "paralegal"),
    ];
    seed.apply(identity.as_ref()).await.expect("seed failed");
    identity
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(seeded_identity().await, Options::default()).await
    }

    async fn spawn_with(identity: Arc<dyn IdentityStore>, options: Options) -> Self {
        // Same router as prod, in-memory stores, ephemeral port.
        let services = Arc::new(
            AppServices::in_memory(identity.clone()).with_trusted_proxy(options.trust_forwarded_for),
        );
        let auth = AuthState {
            jwt: options
                .secret
                .map(|s| Arc::new(Hs256JwtValidator::new(s.as_bytes())) as Arc<dyn JwtValidator>),
            identity: identity.clone(),
            legacy_token: options.legacy_token,
        };
        let app = app::router(services.clone(), auth);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .unwrap();
        });

        Self {
            base_url,
            identity,
            services,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn user_id(&self, email: &str) -> UserId {
        self.identity.user_by_email(email).await.unwrap().unwrap().id
    }

    async fn token_for(&self, email: &str) -> String {
        mint_jwt(SECRET, self.user_id(email).await, ChronoDuration::minutes(10))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(secret: &str, sub: UserId, ttl: ChronoDuration) -> String {
    let now = Utc::now();
    let claims = JwtClaims::new(sub, now - ChronoDuration::minutes(1), now + ttl);

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn audit_rows(
    client: &reqwest::Client,
    srv: &TestServer,
    admin_token: &str,
    entity_id: &str,
    expected: usize,
) -> Vec<Value> {
    // Audit writes are fire-and-forget; poll briefly until they land.
    let mut rows = Vec::new();
    for _ in 0..50 {
        let res = client
            .get(srv.url("/admin/audit"))
            .query(&[("entity_type", "arbitration_application"), ("entity_id", entity_id)])
            .bearer_auth(admin_token)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        rows = res.json::<Vec<Value>>().await.unwrap();
        if rows.len() >= expected {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    rows
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_header_is_rejected_with_structured_body() {
    let srv = TestServer::spawn().await;

    let res = reqwest::get(srv.url("/whoami")).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Authorization header missing");
    assert_eq!(body["path"], "/whoami");
    assert!(body["timestamp"].is_i64());
}

#[tokio::test]
async fn basic_scheme_is_a_format_error() {
    let srv = TestServer::spawn().await;

    let res = reqwest::Client::new()
        .get(srv.url("/whoami"))
        .header("Authorization", "Basic xyz")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body: Value = res.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().starts_with("Invalid token format"));
}

#[tokio::test]
async fn expired_forged_and_unknown_subject_tokens_look_the_same() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let lawyer = srv.user_id("lawyer@firm.example").await;

    let expired = {
        let now = Utc::now();
        let claims = JwtClaims::new(lawyer, now - ChronoDuration::hours(2), now - ChronoDuration::hours(1));
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    };
    let forged = mint_jwt("not-the-secret", lawyer, ChronoDuration::minutes(10));
    let stranger = mint_jwt(SECRET, UserId::new(), ChronoDuration::minutes(10));

    for token in [expired, forged, stranger, "garbage".to_string()] {
        let res = client.get(srv.url("/whoami")).bearer_auth(&token).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["message"], "Invalid or expired token");
    }
}

#[tokio::test]
async fn deleted_user_can_no_longer_authenticate() {
    let srv = TestServer::spawn().await;
    let token = srv.token_for("lawyer@firm.example").await;
    let lawyer = srv.user_id("lawyer@firm.example").await;

    srv.identity.soft_delete_user(lawyer).await.unwrap();

    let res = reqwest::Client::new()
        .get(srv.url("/whoami"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_secret_reports_unavailable() {
    let identity = seeded_identity().await;
    let srv = TestServer::spawn_with(
        identity,
        Options {
            secret: None,
            ..Options::default()
        },
    )
    .await;
    let token = srv.token_for("lawyer@firm.example").await;

    let res = reqwest::Client::new()
        .get(srv.url("/whoami"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Authentication unavailable");
}

#[tokio::test]
async fn legacy_token_is_used_only_without_a_header() {
    let identity = seeded_identity().await;
    let lawyer = identity.user_by_email("lawyer@firm.example").await.unwrap().unwrap();
    let legacy = mint_jwt(SECRET, lawyer.id, ChronoDuration::minutes(10));
    let srv = TestServer::spawn_with(
        identity,
        Options {
            legacy_token: Some(legacy),
            ..Options::default()
        },
    )
    .await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["email"], "lawyer@firm.example");

    // An explicit header always wins, even a bad one.
    let res = client
        .get(srv.url("/whoami"))
        .header("Authorization", "Basic xyz")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn whoami_reports_roles_and_permissions() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(srv.token_for("lawyer@firm.example").await)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["roles"], json!(["lawyer"]));
    let permissions = body["permissions"].as_array().unwrap();
    assert!(permissions.iter().any(|p| p == "CASE_EDIT"));
    assert!(!permissions.iter().any(|p| p == "DOC_DELETE"));

    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(srv.token_for("admin@firm.example").await)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["permissions"], json!(["*"]));
}

#[tokio::test]
async fn lawyer_lacks_delete_permissions() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = srv.token_for("lawyer@firm.example").await;

    let res = client
        .get(srv.url("/permissions/check"))
        .query(&[("permission", "DOC_DELETE")])
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["granted"], false);

    let res = client
        .post(srv.url("/applications"))
        .bearer_auth(&token)
        .json(&json!({"title": "Smith v. Acme", "claimant": "Smith", "respondent": "Acme"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap();

    let res = client
        .delete(srv.url(&format!("/applications/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Forbidden");
    assert_eq!(body["path"], format!("/applications/{id}"));
    assert!(!body.to_string().contains("APPLICATION_DELETE"));
}

#[tokio::test]
async fn each_guarded_request_is_audited_once_even_on_failure() {
    let srv = TestServer::spawn_with(
        seeded_identity().await,
        Options {
            trust_forwarded_for: true,
            ..Options::default()
        },
    )
    .await;
    let client = reqwest::Client::new();
    let lawyer_token = srv.token_for("lawyer@firm.example").await;
    let admin_token = srv.token_for("admin@firm.example").await;
    let lawyer = srv.user_id("lawyer@firm.example").await;

    let missing = uuid::Uuid::now_v7().to_string();
    let res = client
        .get(srv.url(&format!("/applications/{missing}")))
        .bearer_auth(&lawyer_token)
        .header("X-Forwarded-For", "203.0.113.9, 10.0.0.1")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let rows = audit_rows(&client, &srv, &admin_token, &missing, 1).await;
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row["actor_user_id"], lawyer.to_string());
    assert_eq!(row["action"], "GET");
    assert_eq!(row["ip"], "203.0.113.9");
    assert_eq!(row["metadata"]["status"], 404);
    assert_eq!(row["metadata"]["path"], format!("/applications/{missing}"));

    // Nothing else trickles in later.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(audit_rows(&client, &srv, &admin_token, &missing, 1).await.len(), 1);
}

#[tokio::test]
async fn application_timeline_records_the_narrative() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = srv.token_for("admin@firm.example").await;

    let res = client
        .post(srv.url("/applications"))
        .bearer_auth(&token)
        .json(&json!({"title": "Jones v. Beta", "claimant": "Jones", "respondent": "Beta", "claim_amount": 250000}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let id = res.json::<Value>().await.unwrap()["id"].as_str().unwrap().to_string();

    let res = client
        .post(srv.url(&format!("/applications/{id}/status")))
        .bearer_auth(&token)
        .json(&json!({"status": "in_progress", "note": "hearing set"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(srv.url(&format!("/applications/{id}/status")))
        .bearer_auth(&token)
        .json(&json!({"status": "archived"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    for email in ["mediator@firm.example", "lawyer@firm.example"] {
        let mediator = srv.user_id(email).await;
        let res = client
            .put(srv.url(&format!("/applications/{id}/mediator")))
            .bearer_auth(&token)
            .json(&json!({"mediator_id": mediator.to_string()}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = client
        .get(srv.url(&format!("/applications/{id}/timeline")))
        .query(&[("order", "oldest_first")])
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let events: Vec<Value> = res.json().await.unwrap();
    let types: Vec<&str> = events.iter().map(|e| e["event_type"].as_str().unwrap()).collect();
    assert_eq!(types, vec!["created", "status_changed", "mediator_assigned", "mediator_changed"]);
    assert_eq!(events[1]["event_data"]["new"], "in_progress");
    assert_eq!(events[1]["event_data"]["note"], "hearing set");
}

#[tokio::test]
async fn menu_follows_role_visibility() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url("/menu"))
        .bearer_auth(srv.token_for("lawyer@firm.example").await)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let paths: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["path"].as_str().unwrap())
        .collect();
    assert_eq!(paths, vec!["/dashboard", "/cases", "/documents", "/applications"]);
    assert!(body["items"][0].get("sortOrder").is_some());

    let res = client
        .get(srv.url("/menu"))
        .query(&[("role_id", uuid::Uuid::now_v7().to_string())])
        .bearer_auth(srv.token_for("lawyer@firm.example").await)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn role_permission_sync_is_atomic() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin_token = srv.token_for("admin@firm.example").await;
    let lawyer_role = srv.identity.role_by_key("lawyer").await.unwrap().unwrap();

    let res = client
        .put(srv.url(&format!("/admin/roles/{}/permissions", lawyer_role.id)))
        .bearer_auth(&admin_token)
        .json(&json!({"permissions": ["DOC_DELETE", "NOT_A_PERMISSION"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let lawyer_token = srv.token_for("lawyer@firm.example").await;
    let res = client
        .get(srv.url("/permissions/check"))
        .query(&[("permission", "DOC_DELETE")])
        .bearer_auth(&lawyer_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.json::<Value>().await.unwrap()["granted"], false);

    let res = client
        .put(srv.url(&format!("/admin/roles/{}/permissions", lawyer_role.id)))
        .bearer_auth(&admin_token)
        .json(&json!({"permissions": ["CASE_VIEW_ALL", "DOC_DELETE"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(srv.url("/permissions/check"))
        .query(&[("permission", "DOC_DELETE")])
        .bearer_auth(&lawyer_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.json::<Value>().await.unwrap()["granted"], true);
}

#[tokio::test]
async fn lawyer_cannot_manage_roles() {
    let srv = TestServer::spawn().await;
    let lawyer_role = srv.identity.role_by_key("lawyer").await.unwrap().unwrap();

    let res = reqwest::Client::new()
        .put(srv.url(&format!("/admin/roles/{}/permissions", lawyer_role.id)))
        .bearer_auth(srv.token_for("lawyer@firm.example").await)
        .json(&json!({"permissions": ["*"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn forwarded_for_is_ignored_unless_the_proxy_is_trusted() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin_token = srv.token_for("admin@firm.example").await;

    let missing = uuid::Uuid::now_v7().to_string();
    let res = client
        .get(srv.url(&format!("/applications/{missing}")))
        .bearer_auth(srv.token_for("lawyer@firm.example").await)
        .header("X-Forwarded-For", "203.0.113.9")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let rows = audit_rows(&client, &srv, &admin_token, &missing, 1).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["ip"], "127.0.0.1");
}

#[tokio::test]
async fn reading_the_audit_log_is_itself_audited() {
    let srv = TestServer::spawn().await;
    let admin = srv.user_id("admin@firm.example").await;

    let res = reqwest::Client::new()
        .get(srv.url("/admin/audit"))
        .bearer_auth(srv.token_for("admin@firm.example").await)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let filter = AuditFilter {
        entity_type: Some("audit_log".to_string()),
        ..AuditFilter::default()
    };
    let mut rows = Vec::new();
    for _ in 0..50 {
        rows = srv.services.audit.list(&filter).await.unwrap();
        if !rows.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    rows = srv.services.audit.list(&filter).await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].action, "list");
    assert_eq!(rows[0].actor_user_id, Some(admin));
    assert_eq!(rows[0].metadata["path"], "/admin/audit");
    assert_eq!(rows[0].metadata["status"], 200);
}

#[tokio::test]
async fn forbidden_audit_read_is_not_recorded() {
    let srv = TestServer::spawn().await;

    let res = reqwest::Client::new()
        .get(srv.url("/admin/audit"))
        .bearer_auth(srv.token_for("lawyer@firm.example").await)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let rows = srv.services.audit.list(&AuditFilter::default()).await.unwrap();
    assert!(rows.is_empty());
}
