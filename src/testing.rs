//! In-process stand-in for the donation API, plus token helpers.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::core::notice::Notifier;
use crate::token::storage::MemoryStore;
use crate::token::store::TokenStore;

pub(crate) const REFRESH_TOKEN: &str = "refresh-1";
pub(crate) const PASSWORD: &str = "correct horse";

pub(crate) fn mint_token_with(claims: Value) -> String {
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"test-secret"),
    )
    .unwrap()
}

pub(crate) fn mint_token(exp: i64) -> String {
    mint_token_with(json!({ "exp": exp, "sub": "1", "email": "ana@example.org" }))
}

/// A token good for an hour, distinguishable by `sub`.
pub(crate) fn fresh_token(sub: &str) -> String {
    mint_token_with(json!({ "exp": Utc::now().timestamp() + 3600, "sub": sub }))
}

pub(crate) fn expired_token() -> String {
    mint_token(Utc::now().timestamp() - 1)
}

pub(crate) fn memory_tokens() -> TokenStore {
    TokenStore::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
        crate::core::config::split_list("access,accessToken,access_token,jwt,token"),
        crate::core::config::split_list("refresh,refreshToken,refresh_token"),
    )
}

#[derive(Clone, Debug)]
pub(crate) enum RefreshReply {
    /// Issue `token` under the given response field.
    Issue(&'static str, String),
    Status(StatusCode),
    Body(Value),
    Delayed(Duration, Box<RefreshReply>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Seen {
    pub(crate) path: String,
    pub(crate) authorization: Option<String>,
}

#[derive(Debug)]
pub(crate) struct MockState {
    refresh_calls: AtomicUsize,
    refresh_reply: Mutex<RefreshReply>,
    accepted: Mutex<HashSet<String>>,
    seen: Mutex<Vec<Seen>>,
}

impl MockState {
    fn record(&self, path: &str, headers: &HeaderMap) {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(String::from);

        self.seen.lock().unwrap().push(Seen {
            path: path.to_string(),
            authorization,
        });
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|token| self.accepted.lock().unwrap().contains(token))
    }
}

pub(crate) struct MockApi {
    pub(crate) url: String,
    state: Arc<MockState>,
}

impl MockApi {
    pub(crate) async fn start(refresh_reply: RefreshReply) -> Self {
        let state = Arc::new(MockState {
            refresh_calls: AtomicUsize::new(0),
            refresh_reply: Mutex::new(refresh_reply),
            accepted: Mutex::new(HashSet::new()),
            seen: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/api/auth/refresh", post(refresh))
            .route("/api/auth/login", post(login))
            .route("/api/auth/me", get(me))
            .route("/api/fundraisers", get(fundraisers).post(fundraisers))
            .route("/api/explore/fundraisers", get(explore))
            .route("/api/broken", get(broken))
            .route("/api/slow", get(slow))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}/api", addr),
            state,
        }
    }

    pub(crate) fn accept(&self, token: &str) {
        self.state.accepted.lock().unwrap().insert(token.to_string());
    }

    pub(crate) fn set_refresh_reply(&self, reply: RefreshReply) {
        *self.state.refresh_reply.lock().unwrap() = reply;
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn seen(&self, path: &str) -> Vec<Seen> {
        self.state
            .seen
            .lock()
            .unwrap()
            .iter()
            .filter(|seen| seen.path == path)
            .cloned()
            .collect()
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "unauthorized", "message": "Token has expired" })),
    )
        .into_response()
}

async fn refresh(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    state.record("/auth/refresh", &headers);

    let expected = format!("Bearer {}", REFRESH_TOKEN);
    if headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) != Some(expected.as_str()) {
        return unauthorized();
    }

    let mut reply = state.refresh_reply.lock().unwrap().clone();

    loop {
        match reply {
            RefreshReply::Delayed(delay, next) => {
                tokio::time::sleep(delay).await;
                reply = *next;
            }
            RefreshReply::Issue(field, token) => {
                state.accepted.lock().unwrap().insert(token.clone());
                return Json(json!({ field: token })).into_response();
            }
            RefreshReply::Status(status) => {
                return (status, Json(json!({ "error": "refresh failed" }))).into_response();
            }
            RefreshReply::Body(body) => return Json(body).into_response(),
        }
    }
}

async fn login(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record("/auth/login", &headers);

    if body.get("password").and_then(Value::as_str) != Some(PASSWORD) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid_credentials", "message": "Invalid credentials" })),
        )
            .into_response();
    }

    let access = fresh_token("login");
    state.accepted.lock().unwrap().insert(access.clone());

    Json(json!({ "access": access, "refresh": REFRESH_TOKEN })).into_response()
}

async fn me(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("/auth/me", &headers);

    if !state.authorized(&headers) {
        return unauthorized();
    }

    Json(json!({ "id": "u-1", "name": "Ana", "email": "ana@example.org" })).into_response()
}

async fn fundraisers(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("/fundraisers", &headers);

    if !state.authorized(&headers) {
        return unauthorized();
    }

    Json(json!([{ "id": "f-1", "title": "Roof repairs" }])).into_response()
}

async fn explore(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("/explore/fundraisers", &headers);

    // optional credentials: a bad one is rejected, none at all is fine
    if headers.contains_key(header::AUTHORIZATION) && !state.authorized(&headers) {
        return unauthorized();
    }

    Json(json!([{ "id": "f-2", "title": "Community garden" }])).into_response()
}

async fn broken(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("/broken", &headers);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "Fundraiser could not be loaded" })),
    )
        .into_response()
}

/// Rejects every caller, after a pause long enough to move the navigator.
async fn slow(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("/slow", &headers);
    tokio::time::sleep(Duration::from_millis(150)).await;

    unauthorized()
}

#[derive(Debug, Default)]
pub(crate) struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub(crate) fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn error(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}
