// Test helpers are intentionally partially used
#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tryon_gateway::domain::{
    DatabaseStatus, MetricsPtr, PersistenceError, Principal, UserRecord, UserRepository,
};
use tryon_gateway::{
    build_router, create_noop_metrics, create_segmind_gateway, AppState, FirebaseVerifier,
    IdentityConfig, KeySource, ServerConfig, UpstreamConfig,
};

pub const PROJECT_ID: &str = "tryon-test";
pub const KID: &str = "test-key-1";
pub const UPSTREAM_API_KEY: &str = "test-upstream-key";

pub const SIGNING_KEY: &[u8] = include_bytes!("../fixtures/identity_signing_key.pem");
pub const PUBLIC_KEY: &[u8] = include_bytes!("../fixtures/identity_public_key.pem");
pub const JWKS: &str = include_str!("../fixtures/identity_jwks.json");

// ============================================================================
// Tokens
// ============================================================================

/// Claims for a valid ID token belonging to `uid`.
pub fn claims_for(uid: &str) -> Value {
    // ---
    let now = Utc::now().timestamp();
    json!({
        "iss": format!("https://securetoken.google.com/{PROJECT_ID}"),
        "aud": PROJECT_ID,
        "sub": uid,
        "iat": now - 5,
        "exp": now + 3600,
        "auth_time": now - 5,
        "email": format!("{uid}@example.com"),
        "name": format!("User {uid}"),
        "email_verified": true,
    })
}

pub fn sign(claims: &Value) -> String {
    // ---
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KID.to_string());
    let key = EncodingKey::from_rsa_pem(SIGNING_KEY).expect("fixture signing key");
    encode(&header, claims, &key).expect("token signing")
}

pub fn token_for(uid: &str) -> String {
    sign(&claims_for(uid))
}

pub fn identity_config(jwks_url: &str) -> IdentityConfig {
    // ---
    IdentityConfig {
        project_id: PROJECT_ID.to_string(),
        jwks_url: jwks_url.to_string(),
    }
}

// ============================================================================
// In-memory user directory
// ============================================================================

/// User directory kept in a map; can be switched into a failing mode.
#[derive(Default)]
pub struct MemoryRepository {
    users: Mutex<HashMap<String, UserRecord>>,
    failing: AtomicBool,
    sync_failing: AtomicBool,
}

impl MemoryRepository {
    // ---
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail upserts only; reads keep working.
    pub fn set_sync_failing(&self, failing: bool) {
        self.sync_failing.store(failing, Ordering::SeqCst);
    }

    pub fn get(&self, id: &str) -> Option<UserRecord> {
        self.users.lock().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::Datastore("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserRepository for MemoryRepository {
    // ---
    async fn upsert_user(&self, p: &Principal) -> Result<(), PersistenceError> {
        // ---
        self.check()?;
        if self.sync_failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::Constraint("users_email_key".to_string()));
        }
        let now = Utc::now();
        let mut users = self.users.lock().unwrap();
        let record = users.entry(p.id.clone()).or_insert_with(|| UserRecord {
            id: p.id.clone(),
            email: None,
            display_name: None,
            photo_url: None,
            created_at: now,
            last_login: now,
            is_email_verified: false,
        });
        record.email = p.email.clone();
        record.display_name = p.display_name.clone();
        record.photo_url = p.avatar_url.clone();
        record.is_email_verified = p.email_verified;
        record.last_login = record.last_login.max(now);
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, PersistenceError> {
        self.check()?;
        Ok(self.get(id))
    }

    async fn update_display_name(&self, id: &str, name: &str) -> Result<bool, PersistenceError> {
        // ---
        self.check()?;
        let mut users = self.users.lock().unwrap();
        Ok(users
            .get_mut(id)
            .map(|record| record.display_name = Some(name.to_string()))
            .is_some())
    }

    async fn ping(&self) -> Result<(), PersistenceError> {
        self.check()
    }

    async fn status(&self) -> Result<DatabaseStatus, PersistenceError> {
        // ---
        self.check()?;
        Ok(DatabaseStatus {
            version: "PostgreSQL 16.0 (memory)".to_string(),
            users: self.len() as i64,
        })
    }
}

// ============================================================================
// Stub upstream image service
// ============================================================================

/// What the stub upstream answers with.
#[derive(Clone)]
pub struct StubReply {
    pub status: StatusCode,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: Vec<u8>,
}

impl StubReply {
    pub fn jpeg(body: &[u8]) -> Self {
        Self {
            status: StatusCode::OK,
            headers: vec![("content-type", "image/jpeg")],
            body: body.to_vec(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            headers: vec![("content-type", "application/json")],
            body: br#"{"error":"stub"}"#.to_vec(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }
}

#[derive(Clone)]
struct StubState {
    reply: Arc<Mutex<StubReply>>,
    calls: Arc<AtomicUsize>,
    last_api_key: Arc<Mutex<Option<String>>>,
    last_payload: Arc<Mutex<Option<Value>>>,
}

async fn stub_handler(State(stub): State<StubState>, headers: HeaderMap, body: Bytes) -> Response {
    // ---
    stub.calls.fetch_add(1, Ordering::SeqCst);
    *stub.last_api_key.lock().unwrap() = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *stub.last_payload.lock().unwrap() = serde_json::from_slice(&body).ok();

    let reply = stub.reply.lock().unwrap().clone();
    let mut response_headers = HeaderMap::new();
    for (name, value) in reply.headers {
        response_headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    (reply.status, response_headers, reply.body).into_response()
}

pub struct StubUpstream {
    pub url: String,
    state: StubState,
}

impl StubUpstream {
    // ---
    pub async fn start(reply: StubReply) -> Self {
        // ---
        let state = StubState {
            reply: Arc::new(Mutex::new(reply)),
            calls: Arc::default(),
            last_api_key: Arc::default(),
            last_payload: Arc::default(),
        };
        let app = Router::new()
            .route("/v1/idm-vton", post(stub_handler))
            .with_state(state.clone());

        let addr = serve(app).await;
        Self {
            url: format!("http://{addr}/v1/idm-vton"),
            state,
        }
    }

    pub fn reply_with(&self, reply: StubReply) {
        *self.state.reply.lock().unwrap() = reply;
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn last_api_key(&self) -> Option<String> {
        self.state.last_api_key.lock().unwrap().clone()
    }

    pub fn last_payload(&self) -> Option<Value> {
        self.state.last_payload.lock().unwrap().clone()
    }
}

/// Serve `app` on an ephemeral local port.
pub async fn serve(app: Router) -> SocketAddr {
    // ---
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

// ============================================================================
// Application under test
// ============================================================================

pub fn server_config() -> ServerConfig {
    // ---
    ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        allowed_origins: vec!["http://localhost:3000".to_string()],
        body_limit: 50 * 1024 * 1024,
        metrics_type: "noop".to_string(),
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    pub repo: Arc<MemoryRepository>,
    pub upstream: StubUpstream,
}

impl TestServer {
    // ---
    pub async fn new() -> Self {
        // ---
        let metrics = create_noop_metrics().expect("noop metrics");
        Self::with_metrics(metrics).await
    }

    pub async fn with_metrics(metrics: MetricsPtr) -> Self {
        // ---
        let upstream = StubUpstream::start(StubReply::jpeg(b"\xFF\xD8stub")).await;
        Self::build(metrics, upstream.url.clone(), upstream).await
    }

    /// Server whose upstream URL points somewhere nothing listens.
    pub async fn with_dead_upstream() -> Self {
        // ---
        let upstream = StubUpstream::start(StubReply::status(500)).await;
        let metrics = create_noop_metrics().expect("noop metrics");
        Self::build(metrics, "http://127.0.0.1:9/v1/idm-vton".to_string(), upstream).await
    }

    async fn build(metrics: MetricsPtr, upstream_url: String, upstream: StubUpstream) -> Self {
        // ---
        let repo = Arc::new(MemoryRepository::default());
        let keys = KeySource::from_rsa_pems([(KID, PUBLIC_KEY)]).expect("fixture public key");
        let verifier = Arc::new(FirebaseVerifier::new(&identity_config(""), keys));

        let gateway = create_segmind_gateway(&UpstreamConfig {
            url: upstream_url,
            api_key: UPSTREAM_API_KEY.to_string(),
            timeout: Duration::from_secs(10),
        })
        .expect("upstream client");

        let state = AppState::new(metrics, repo.clone(), verifier, gateway);
        let app = build_router(state, &server_config()).expect("router");
        let addr = serve(app).await;

        Self {
            addr,
            client: Client::new(),
            repo,
            upstream,
        }
    }

    pub fn url(&self, path: &str) -> String {
        // ---
        format!("http://{}{}", self.addr, path)
    }

    pub async fn try_on(&self, token: Option<&str>, body: &Value) -> reqwest::Response {
        // ---
        let mut request = self.client.post(self.url("/api/try-on")).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("request failed")
    }
}

pub fn try_on_body() -> Value {
    json!({
        "model_image": "https://cdn.example.com/model.jpg",
        "cloth_image": "c2hpcnQ=",
        "category": "upper_body",
    })
}
