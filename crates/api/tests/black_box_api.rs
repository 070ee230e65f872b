use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

use userhub_api::app::{AppServices, build_app};
use userhub_auth::roles::{ADMIN, WATCHER};
use userhub_auth::{JwtTokenMaker, Role, TokenMaker, TokenPayload};
use userhub_core::TokenId;
use userhub_events::topology::WELCOME_EMAIL_QUEUE;
use userhub_events::{InMemoryBroker, MessagePublisher, Topology, TopologyDeclarer, UserCreated};
use userhub_infra::{AppConfig, InMemoryUserStore, NewUser, UserStore};

const JWT_SECRET: &str = "black-box-secret-at-least-32-bytes!!";
const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "admin-pw";

struct TestServer {
    base_url: String,
    broker: InMemoryBroker,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let config = AppConfig::from_lookup(|key: &str| match key {
            "JWT_SECRET" => Some(JWT_SECRET.to_string()),
            _ => None,
        })
        .unwrap();

        let broker = InMemoryBroker::new();
        broker.declare(&Topology::welcome_email()).await.unwrap();

        let store: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::new());
        store
            .create(NewUser {
                name: "Admin".to_string(),
                email: ADMIN_EMAIL.to_string(),
                password: ADMIN_PASSWORD.to_string(),
                roles: vec![Role::from(ADMIN)],
            })
            .await
            .unwrap();

        let publisher: Arc<dyn MessagePublisher> = Arc::new(broker.clone());
        let services = AppServices::from_config(&config, publisher, store).unwrap();

        // Same router as prod, bound to an ephemeral port.
        let app = build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            broker,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn issue(roles: &[&'static str]) -> String {
    let roles: Vec<Role> = roles.iter().copied().map(Role::from).collect();
    JwtTokenMaker::new(JWT_SECRET)
        .unwrap()
        .create_token("someone@example.com", &roles, ChronoDuration::minutes(10))
        .unwrap()
}

/// Token signed out-of-band, the way another service holding the secret would.
fn mint_jwt(roles: Vec<Role>, issued_at: chrono::DateTime<Utc>, ttl: ChronoDuration) -> String {
    let claims = TokenPayload {
        id: TokenId::new(),
        subject: "external@example.com".to_string(),
        roles,
        issued_at,
        expires_at: issued_at + ttl,
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn error_code(res: reqwest::Response) -> String {
    let body: serde_json::Value = res.json().await.unwrap();
    body["error"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn version_route_is_public() {
    let srv = TestServer::spawn().await;

    let res = reqwest::get(srv.url("/")).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "Version 1");
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(res).await, "missing_token");

    let res = client
        .get(srv.url("/whoami"))
        .header("Authorization", "Token abc")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_token_is_rejected_as_expired() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(
        vec![Role::from(ADMIN)],
        Utc::now() - ChronoDuration::hours(2),
        ChronoDuration::hours(1),
    );

    let res = reqwest::Client::new()
        .get(srv.url("/verify-token"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(res).await, "token_expired");
}

#[tokio::test]
async fn token_signed_with_another_secret_is_invalid() {
    let srv = TestServer::spawn().await;
    let other = JwtTokenMaker::new("a-completely-different-secret-value!")
        .unwrap()
        .create_token("x@example.com", &[Role::from(ADMIN)], ChronoDuration::minutes(5))
        .unwrap();

    let res = reqwest::Client::new()
        .get(srv.url("/verify-token"))
        .bearer_auth(other)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(res).await, "invalid_token");
}

#[tokio::test]
async fn verify_token_and_whoami_reflect_the_token() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(
        vec![Role::from(WATCHER)],
        Utc::now(),
        ChronoDuration::minutes(10),
    );
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url("/verify-token"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "data": true }));

    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["subject"], "external@example.com");
    assert_eq!(body["roles"], json!(["Watcher"]));
}

#[tokio::test]
async fn non_admin_cannot_manage_users() {
    let srv = TestServer::spawn().await;
    let token = issue(&[WATCHER]);

    let res = reqwest::Client::new()
        .post(srv.url("/user"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Ada", "email": "ada@x.com", "password": "pw" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(srv.broker.published().is_empty());
}

#[tokio::test]
async fn admin_creates_user_and_event_reaches_welcome_queue() {
    let srv = TestServer::spawn().await;
    let token = issue(&[ADMIN]);

    let res = reqwest::Client::new()
        .post(srv.url("/user"))
        .bearer_auth(&token)
        .json(&json!({
            "name": "Ada",
            "email": "ada@x.com",
            "password": "pw",
            "roles": ["Watcher"]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    assert_eq!(created["email"], "ada@x.com");
    assert!(created.get("password_hash").is_none());

    let published = srv.broker.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].exchange, "user_events");
    assert_eq!(published[0].routing_key, "user.created");
    let event: UserCreated = serde_json::from_slice(&published[0].message.body).unwrap();
    assert_eq!(event.email, "ada@x.com");
    assert_eq!(event.id.get(), created["id"].as_u64().unwrap());
    assert_eq!(srv.broker.ready_len(WELCOME_EMAIL_QUEUE), 1);
}

#[tokio::test]
async fn duplicate_user_is_conflict_without_second_event() {
    let srv = TestServer::spawn().await;
    let token = issue(&[ADMIN]);
    let client = reqwest::Client::new();
    let body = json!({ "name": "Ada", "email": "ada@x.com", "password": "pw" });

    let first = client
        .post(srv.url("/user"))
        .bearer_auth(&token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = client
        .post(srv.url("/user"))
        .bearer_auth(&token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(srv.broker.published().len(), 1);
}

#[tokio::test]
async fn unavailable_broker_surfaces_as_bad_gateway() {
    let srv = TestServer::spawn().await;
    srv.broker.set_unavailable(true);

    let res = reqwest::Client::new()
        .post(srv.url("/user"))
        .bearer_auth(issue(&[ADMIN]))
        .json(&json!({ "name": "Ada", "email": "ada@x.com", "password": "pw" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(error_code(res).await, "publish_error");
}

#[tokio::test]
async fn login_returns_token_usable_on_admin_routes() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/login"))
        .json(&json!({ "username": ADMIN_EMAIL, "password": ADMIN_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["roles"], json!(["Admin"]));
    let token = body["token"].as_str().unwrap().to_string();

    let res = client
        .get(srv.url("/user"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let users: serde_json::Value = res.json().await.unwrap();
    assert_eq!(users.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn login_with_bad_password_is_unauthorized() {
    let srv = TestServer::spawn().await;

    let res = reqwest::Client::new()
        .post(srv.url("/login"))
        .json(&json!({ "username": ADMIN_EMAIL, "password": "wrong" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(res).await, "invalid_credentials");
}

#[tokio::test]
async fn admin_manages_roles_of_existing_user() {
    let srv = TestServer::spawn().await;
    let token = issue(&[ADMIN]);
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/user/1/roles/Modifier"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let user: serde_json::Value = res.json().await.unwrap();
    assert_eq!(user["roles"], json!(["Admin", "Modifier"]));

    let res = client
        .get(srv.url("/user/42"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_body_gets_a_json_error() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/login"))
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body("{\"username\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(res).await, "invalid_body");

    let res = client
        .post(srv.url("/user"))
        .bearer_auth(issue(&[ADMIN]))
        .json(&json!({ "name": "Ada" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(res).await, "invalid_body");
}

#[tokio::test]
async fn non_numeric_user_id_gets_a_json_error() {
    let srv = TestServer::spawn().await;

    let res = reqwest::Client::new()
        .get(srv.url("/user/abc"))
        .bearer_auth(issue(&[ADMIN]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(res).await, "invalid_path");
}
