//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use campaigns::provider::{MessagingProvider, OutboundMessage, ProviderError};
use campaigns::queue::{DispatchJob, DispatchQueue};
use campaigns::store::{self, DbPool, NewUser, Role, User, UserRepo};
use campaigns::web::password::hash_password;
use campaigns::web::{router, SessionSigner};
use campaigns::{AppState, Config};

pub const PASSWORD: &str = "password";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const USER_EMAIL: &str = "user@example.com";

// =============================================================================
// Fake provider
// =============================================================================

/// Provider that fails for chosen phone numbers and records every attempt.
#[derive(Default)]
pub struct FakeProvider {
    failures: HashMap<String, String>,
    sent: Mutex<Vec<OutboundMessage>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail sends to `phone` with a provider API error carrying `message`.
    pub fn failing(mut self, phone: &str, message: &str) -> Self {
        self.failures.insert(phone.to_string(), message.to_string());
        self
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingProvider for FakeProvider {
    async fn send(&self, message: &OutboundMessage) -> Result<String, ProviderError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());

        match self.failures.get(&message.to) {
            Some(reason) => Err(ProviderError::Api {
                status: 400,
                code: Some(21211),
                message: reason.clone(),
                more_info: Some("https://www.twilio.com/docs/errors/21211".to_string()),
            }),
            None => Ok(format!("SM{:032}", sent.len())),
        }
    }
}

// =============================================================================
// In-memory queue
// =============================================================================

#[derive(Default)]
pub struct MemoryQueue {
    pub jobs: Mutex<Vec<DispatchJob>>,
    pub fail: bool,
}

impl MemoryQueue {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn jobs(&self) -> Vec<DispatchJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl DispatchQueue for MemoryQueue {
    async fn enqueue(&self, job: &DispatchJob) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("broker unavailable");
        }
        self.jobs.lock().unwrap().push(job.clone());
        Ok(())
    }
}

// =============================================================================
// Database
// =============================================================================

pub async fn seeded_pool() -> (DbPool, User, User) {
    let pool = store::connect_in_memory().await.unwrap();
    let admin = create_user(&pool, ADMIN_EMAIL, Role::Admin).await;
    let user = create_user(&pool, USER_EMAIL, Role::Standard).await;
    (pool, admin, user)
}

pub async fn create_user(pool: &DbPool, email: &str, role: Role) -> User {
    UserRepo::create(
        pool,
        &NewUser {
            email: email.to_string(),
            password_hash: hash_password(PASSWORD).unwrap(),
            role,
        },
    )
    .await
    .unwrap()
}

// =============================================================================
// HTTP app
// =============================================================================

pub struct TestApp {
    pub router: Router,
    pub pool: DbPool,
    pub queue: Arc<MemoryQueue>,
    pub admin: User,
    pub user: User,
    pub upload_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_queue(MemoryQueue::default()).await
    }

    pub async fn with_queue(queue: MemoryQueue) -> Self {
        let (pool, admin, user) = seeded_pool().await;
        let upload_dir = tempfile::tempdir().unwrap();

        let config = Config {
            upload_dir: upload_dir.path().join("uploads"),
            ..Config::default()
        };
        let sessions = SessionSigner::new("test-secret", 3600, false).unwrap();
        let queue = Arc::new(queue);

        let state = AppState::new(config, pool.clone(), queue.clone(), None, sessions);

        Self {
            router: router(state),
            pool,
            queue,
            admin,
            user,
            upload_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Log in and return the `Cookie` header value for the session.
    pub async fn login(&self, email: &str) -> String {
        let response = self
            .send(json_request("POST", "/api/login", None, &serde_json::json!({
                "email": email,
                "password": PASSWORD,
            })))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }
}

pub fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

const BOUNDARY: &str = "----campaigns-test-boundary";

/// Multipart campaign upload. `fields` are text fields; the file goes in `csvFile`.
pub fn upload_request(cookie: Option<&str>, fields: &[(&str, &str)], csv: Option<&str>) -> Request<Body> {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    if let Some(csv) = csv {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"csvFile\"; filename=\"recipients.csv\"\r\n\
             Content-Type: text/csv\r\n\r\n{csv}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/campaigns")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Three valid recipients and one row missing its name.
pub const RECIPIENTS_CSV: &str = "\
+5215550001,Ana
+5215550002,Luis
+5215550003
+5215550004,Marta
";
