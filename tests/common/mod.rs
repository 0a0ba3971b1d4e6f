// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wellness_client::db::LocalStore;
use wellness_client::error::{AppError, AuthErrorKind};
use wellness_client::middleware::RequestPipeline;
use wellness_client::models::{Session, SessionUser};
use wellness_client::services::{
    ApiClient, ApiRequest, IdentityProvider, RawResponse, SessionManager, SignUpOutcome,
    Transport, TransportError, WellnessService,
};

pub const BASE_URL: &str = "http://backend.test";
pub const THRESHOLD_SECS: i64 = 300;

#[allow(dead_code)]
pub fn test_user() -> SessionUser {
    SessionUser {
        id: "user-1".to_string(),
        email: Some("sam@example.com".to_string()),
        metadata: Default::default(),
    }
}

/// Session whose access token expires `secs` from now.
#[allow(dead_code)]
pub fn session_expiring_in(secs: i64, access_token: &str) -> Session {
    Session {
        access_token: access_token.to_string(),
        refresh_token: format!("refresh-for-{}", access_token),
        token_type: "bearer".to_string(),
        expires_at: Utc::now() + Duration::seconds(secs),
        user: test_user(),
    }
}

// ─── Scripted transport ──────────────────────────────────────────────────────

type Responder = dyn Fn(&ApiRequest, usize) -> Result<RawResponse, TransportError> + Send + Sync;

/// Transport that answers from a closure and records every request.
pub struct MockTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<ApiRequest>>,
    delay: std::time::Duration,
}

#[allow(dead_code)]
impl MockTransport {
    /// `responder` gets the request and its zero-based index.
    pub fn new(
        responder: impl Fn(&ApiRequest, usize) -> Result<RawResponse, TransportError>
            + Send
            + Sync
            + 'static,
    ) -> Arc<Self> {
        Self::delayed(std::time::Duration::ZERO, responder)
    }

    /// Like `new`, but every request waits `delay` before it is answered.
    pub fn delayed(
        delay: std::time::Duration,
        responder: impl Fn(&ApiRequest, usize) -> Result<RawResponse, TransportError>
            + Send
            + Sync
            + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            delay,
        })
    }

    /// Always answer with the same response.
    pub fn always(response: RawResponse) -> Arc<Self> {
        Self::new(move |_, _| Ok(response.clone()))
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.responder)(request, index)
    }
}

// ─── Counting identity provider ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(dead_code)]
pub enum RefreshBehavior {
    /// New session valid for this many seconds
    Succeed(i64),
    /// Refresh token rejected (invalid_grant)
    Reject,
    /// Provider unreachable
    Unreachable,
}

pub struct MockProvider {
    pub refresh_behavior: Mutex<RefreshBehavior>,
    pub refresh_delay: std::time::Duration,
    pub refresh_calls: AtomicUsize,
    pub sign_in_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
    pub sign_out_fails: bool,
    /// Result of `get_user`: Ok(()) means the token is accepted
    pub get_user_result: Mutex<Result<(), AuthErrorKind>>,
}

#[allow(dead_code)]
impl MockProvider {
    pub fn new(behavior: RefreshBehavior) -> Self {
        Self {
            refresh_behavior: Mutex::new(behavior),
            refresh_delay: std::time::Duration::from_millis(0),
            refresh_calls: AtomicUsize::new(0),
            sign_in_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
            sign_out_fails: false,
            get_user_result: Mutex::new(Ok(())),
        }
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for MockProvider {
    async fn sign_in(&self, _email: &str, _password: &str) -> Result<Session, AppError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        Ok(session_expiring_in(3600, "access-1"))
    }

    async fn sign_up(
        &self,
        _email: &str,
        _password: &str,
        metadata: serde_json::Value,
    ) -> Result<SignUpOutcome, AppError> {
        let mut session = session_expiring_in(3600, "access-1");
        if let serde_json::Value::Object(map) = metadata {
            session.user.metadata = map;
        }
        Ok(SignUpOutcome::SignedIn(session))
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), AppError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.sign_out_fails {
            return Err(AppError::Network("connection refused".to_string()));
        }
        Ok(())
    }

    async fn get_user(&self, _access_token: &str) -> Result<SessionUser, AppError> {
        match *self.get_user_result.lock().unwrap() {
            Ok(()) => Ok(test_user()),
            Err(kind) => Err(AppError::Auth(kind)),
        }
    }

    async fn refresh_session(&self, _refresh_token: &str) -> Result<Session, AppError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.refresh_delay.is_zero() {
            tokio::time::sleep(self.refresh_delay).await;
        }
        let behavior = *self.refresh_behavior.lock().unwrap();
        match behavior {
            RefreshBehavior::Succeed(secs) => {
                Ok(session_expiring_in(secs, &format!("access-refreshed-{}", n)))
            }
            RefreshBehavior::Reject => Err(AppError::Auth(AuthErrorKind::Expired)),
            RefreshBehavior::Unreachable => {
                Err(AppError::Network("connection refused".to_string()))
            }
        }
    }

    async fn reset_password(&self, _email: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn update_user(
        &self,
        _access_token: &str,
        metadata: serde_json::Value,
    ) -> Result<SessionUser, AppError> {
        let mut user = test_user();
        if let serde_json::Value::Object(map) = metadata {
            user.metadata = map;
        }
        Ok(user)
    }
}

// ─── Wiring ──────────────────────────────────────────────────────────────────

#[allow(dead_code)]
pub struct Harness {
    pub provider: Arc<MockProvider>,
    pub transport: Arc<MockTransport>,
    pub store: LocalStore,
    pub sessions: SessionManager,
    pub api: ApiClient,
    pub wellness: WellnessService,
}

/// Client stack over mocks, with `session` (if any) already active.
#[allow(dead_code)]
pub async fn harness(
    provider: MockProvider,
    transport: Arc<MockTransport>,
    session: Option<Session>,
) -> Harness {
    let provider = Arc::new(provider);
    let store = LocalStore::new_mock();

    let sessions = SessionManager::new(provider.clone(), store.clone(), THRESHOLD_SECS);
    if let Some(session) = session {
        sessions.set_session(session).await;
    }

    let api = ApiClient::new(
        BASE_URL,
        transport.clone(),
        RequestPipeline::standard("anon-key"),
        sessions.clone(),
    );
    let wellness = WellnessService::new(api.clone(), store.clone());

    Harness {
        provider,
        transport,
        store,
        sessions,
        api,
        wellness,
    }
}

#[allow(dead_code)]
pub fn json_ok(body: serde_json::Value) -> RawResponse {
    RawResponse::json(200, &body)
}

#[allow(dead_code)]
pub fn jwt_expired() -> RawResponse {
    RawResponse::json(401, &serde_json::json!({"error": {"message": "jwt expired"}}))
}
