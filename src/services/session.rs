// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session lifecycle: sign-in, restore, refresh, sign-out.
//!
//! The manager owns the single active session. It is read by every request
//! and written only by login, refresh, and logout. Refreshes are single-flight:
//! concurrent callers share one in-flight provider call and all receive its
//! outcome. The in-flight slot holds only a weak handle, so if every waiter
//! abandons the call the refresh is dropped along with them.

use crate::db::LocalStore;
use crate::error::{AppError, AuthErrorKind};
use crate::middleware::token_claims;
use crate::models::{AuthEvent, AuthStateChange, Credentials, Session, SessionUser};
use crate::services::supabase::{IdentityProvider, SignUpOutcome};
use chrono::Utc;
use futures_util::future::{BoxFuture, FutureExt, Shared, WeakShared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use validator::{Validate, ValidateEmail};

const EVENT_CHANNEL_CAPACITY: usize = 32;

type RefreshFuture = BoxFuture<'static, Result<Session, RefreshFailure>>;

/// Cloneable refresh outcome shared between concurrent waiters.
#[derive(Debug, Clone)]
enum RefreshFailure {
    /// Provider rejected the refresh token; the session has been ended
    Rejected(AuthErrorKind),
    Network(String),
    Malformed(String),
    Other(String),
    /// Session was ended while the refresh was running
    Superseded,
}

impl From<RefreshFailure> for AppError {
    fn from(failure: RefreshFailure) -> Self {
        match failure {
            RefreshFailure::Rejected(_) => AppError::Auth(AuthErrorKind::Expired),
            RefreshFailure::Network(msg) => AppError::Network(msg),
            RefreshFailure::Malformed(msg) => AppError::MalformedResponse(msg),
            RefreshFailure::Other(msg) => AppError::Internal(anyhow::anyhow!(msg)),
            RefreshFailure::Superseded => AppError::NotAuthenticated,
        }
    }
}

struct Inner {
    provider: Arc<dyn IdentityProvider>,
    store: LocalStore,
    session: RwLock<Option<Session>>,
    /// Bumped on every session change, only while `session` is write-locked
    generation: AtomicU64,
    in_flight: Mutex<Option<WeakShared<RefreshFuture>>>,
    events: broadcast::Sender<AuthStateChange>,
    threshold_secs: i64,
}

impl Inner {
    fn emit(&self, event: AuthEvent, session: Option<&Session>) {
        // No subscribers is fine.
        let _ = self.events.send(AuthStateChange::new(event, session));
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Make `session` the active one, mirror it locally, and announce it.
    async fn install(&self, session: Session, event: AuthEvent) {
        self.install_if_current(session, event, None).await;
    }

    /// Like `install`, but only if no session change happened since
    /// `expected` was observed. Returns false when the session was superseded.
    async fn install_if_current(
        &self,
        session: Session,
        event: AuthEvent,
        expected: Option<u64>,
    ) -> bool {
        {
            // Held across the store write so memory and disk change together.
            let mut current = self.session.write().await;
            if expected.is_some_and(|g| g != self.generation()) {
                return false;
            }
            self.generation.fetch_add(1, Ordering::SeqCst);
            *current = Some(session.clone());
            if let Err(e) = self.store.set_session(&session).await {
                tracing::warn!(error = %e, "Failed to mirror session locally");
            }
        }
        self.emit(event, Some(&session));
        true
    }

    /// Replace the in-memory session without mirroring or announcing it.
    async fn set_current(&self, session: Session) {
        let mut current = self.session.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        *current = Some(session);
    }

    /// End the local session. Returns true if there was one to end.
    async fn terminate(&self) -> bool {
        self.terminate_if_current(None).await
    }

    /// Like `terminate`, but a no-op if the session changed since `expected`.
    async fn terminate_if_current(&self, expected: Option<u64>) -> bool {
        let previous = {
            let mut current = self.session.write().await;
            if expected.is_some_and(|g| g != self.generation()) {
                return false;
            }
            self.generation.fetch_add(1, Ordering::SeqCst);
            let previous = current.take();
            if let Err(e) = self.store.clear_user_data().await {
                tracing::warn!(error = %e, "Failed to clear local session");
            }
            previous
        };
        match previous {
            Some(session) => {
                tracing::info!(user_id = %session.user.id, "Local session ended");
                self.emit(AuthEvent::SignedOut, None);
                true
            }
            None => false,
        }
    }
}

/// Auth session bridge over the identity provider.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: LocalStore,
        threshold_secs: i64,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                provider,
                store,
                session: RwLock::new(None),
                generation: AtomicU64::new(0),
                in_flight: Mutex::new(None),
                events,
                threshold_secs,
            }),
        }
    }

    /// Subscribe to auth state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.inner.events.subscribe()
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.inner.session.read().await.clone()
    }

    pub async fn current_user(&self) -> Option<SessionUser> {
        self.inner
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.user.clone())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.session.read().await.is_some()
    }

    // ─── Sign-in / sign-out ──────────────────────────────────────────────────

    /// Load the mirrored session and re-validate it with the provider.
    ///
    /// The stored copy is only a hint. The token's own `exp` claim overrides the
    /// stored expiry; a near-expiry session is refreshed, otherwise the token is
    /// checked with the provider. If the provider cannot be reached the stored
    /// session is kept and will be re-checked by the first request.
    pub async fn restore(&self) -> Result<Option<Session>, AppError> {
        let Some(mut stored) = self.inner.store.session() else {
            self.inner.emit(AuthEvent::InitialSession, None);
            return Ok(None);
        };

        if let Some(expires_at) = token_claims(&stored.access_token).and_then(|c| c.expires_at()) {
            stored.expires_at = expires_at;
        }
        self.inner.set_current(stored.clone()).await;

        let validated = if stored.needs_refresh(Utc::now(), self.inner.threshold_secs) {
            self.refresh_single_flight(&stored.access_token).await
        } else {
            match self.inner.provider.get_user(&stored.access_token).await {
                Ok(user) => {
                    stored.user = user;
                    self.inner.set_current(stored.clone()).await;
                    Ok(stored.clone())
                }
                Err(e) if e.is_auth_error() => {
                    self.refresh_single_flight(&stored.access_token).await
                }
                Err(e) => Err(e),
            }
        };

        match validated {
            Ok(session) => {
                tracing::info!(user_id = %session.user.id, "Session restored");
                self.inner.emit(AuthEvent::InitialSession, Some(&session));
                Ok(Some(session))
            }
            Err(e) if e.is_auth_error() => {
                tracing::info!(error = %e, "Stored session no longer valid");
                self.inner.terminate().await;
                self.inner.emit(AuthEvent::InitialSession, None);
                Ok(None)
            }
            Err(e) if e.is_network_error() => {
                tracing::warn!(error = %e, "Provider unreachable, keeping stored session");
                self.inner.emit(AuthEvent::InitialSession, Some(&stored));
                Ok(Some(stored))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let credentials = Credentials {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        credentials.validate()?;

        let session = self
            .inner
            .provider
            .sign_in(&credentials.email, &credentials.password)
            .await?;
        self.inner.install(session.clone(), AuthEvent::SignedIn).await;
        Ok(session)
    }

    /// Adopt a session obtained outside the password flow (magic link or
    /// OAuth redirect callback).
    pub async fn set_session(&self, session: Session) {
        self.inner.install(session, AuthEvent::SignedIn).await;
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<SignUpOutcome, AppError> {
        let credentials = Credentials {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        credentials.validate()?;

        let mut metadata = serde_json::Map::new();
        if let Some(name) = display_name.map(str::trim).filter(|n| !n.is_empty()) {
            metadata.insert("display_name".to_string(), name.into());
        }

        let outcome = self
            .inner
            .provider
            .sign_up(
                &credentials.email,
                &credentials.password,
                serde_json::Value::Object(metadata),
            )
            .await?;

        if let SignUpOutcome::SignedIn(session) = &outcome {
            self.inner.install(session.clone(), AuthEvent::SignedIn).await;
        }
        Ok(outcome)
    }

    /// Sign out. The remote call is best effort; local state is always cleared.
    pub async fn logout(&self) -> Result<(), AppError> {
        let current = self.current_session().await;
        if let Some(session) = &current {
            if let Err(e) = self.inner.provider.sign_out(&session.access_token).await {
                tracing::warn!(error = %e, "Remote sign-out failed, clearing local session anyway");
            }
        }
        if !self.inner.terminate().await {
            tracing::debug!("Logout without an active session");
        }
        Ok(())
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), AppError> {
        let email = email.trim();
        if !email.to_string().validate_email() {
            return Err(AppError::Validation(
                "email must be a valid email address".to_string(),
            ));
        }
        self.inner.provider.reset_password(email).await
    }

    /// Merge `metadata` into the user's provider-side metadata.
    pub async fn update_metadata(
        &self,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<SessionUser, AppError> {
        let session = self
            .refresh_if_needed()
            .await?
            .ok_or(AppError::NotAuthenticated)?;

        let user = self
            .inner
            .provider
            .update_user(&session.access_token, serde_json::Value::Object(metadata))
            .await?;

        let updated = {
            let mut guard = self.inner.session.write().await;
            match guard.as_mut() {
                Some(current) if current.user.id == user.id => {
                    current.user = user.clone();
                    Some(current.clone())
                }
                _ => None,
            }
        };
        if let Some(session) = updated {
            if let Err(e) = self.inner.store.set_session(&session).await {
                tracing::warn!(error = %e, "Failed to mirror session locally");
            }
            self.inner.emit(AuthEvent::UserUpdated, Some(&session));
        }
        Ok(user)
    }

    // ─── Refresh ─────────────────────────────────────────────────────────────

    /// Return the current session, refreshing it first if it is within the
    /// refresh threshold. `Ok(None)` when nobody is signed in.
    ///
    /// A refresh that fails for a non-auth reason is tolerated while the
    /// current token has not actually expired yet.
    pub async fn refresh_if_needed(&self) -> Result<Option<Session>, AppError> {
        let Some(session) = self.current_session().await else {
            return Ok(None);
        };

        let now = Utc::now();
        if !session.needs_refresh(now, self.inner.threshold_secs) {
            return Ok(Some(session));
        }

        tracing::debug!(
            seconds_left = session.seconds_until_expiry(now),
            "Session within refresh threshold"
        );

        match self.refresh_single_flight(&session.access_token).await {
            Ok(fresh) => Ok(Some(fresh)),
            Err(e) if !e.is_auth_error() && !session.is_expired(Utc::now()) => {
                tracing::warn!(error = %e, "Refresh failed, using current token until expiry");
                Ok(Some(session))
            }
            Err(e) => Err(e),
        }
    }

    /// Recover after the backend rejected `rejected_access_token`.
    ///
    /// If the session was already replaced since that token was sent, the
    /// newer session is returned without another provider call.
    pub async fn recover_from_rejection(
        &self,
        rejected_access_token: &str,
    ) -> Result<Session, AppError> {
        self.refresh_single_flight(rejected_access_token).await
    }

    async fn refresh_single_flight(&self, stale_access_token: &str) -> Result<Session, AppError> {
        let refresh = {
            let mut slot = self.inner.in_flight.lock().await;

            match slot.as_ref().and_then(WeakShared::upgrade) {
                Some(existing) => existing,
                None => {
                    let (refresh_token, generation) = {
                        let current = self.inner.session.read().await;
                        match current.as_ref() {
                            None => return Err(AppError::NotAuthenticated),
                            Some(s) if s.access_token != stale_access_token => {
                                return Ok(s.clone());
                            }
                            Some(s) => (s.refresh_token.clone(), self.inner.generation()),
                        }
                    };

                    let fresh: Shared<RefreshFuture> =
                        run_refresh(self.inner.clone(), refresh_token, generation)
                            .boxed()
                            .shared();
                    *slot = fresh.downgrade();
                    fresh
                }
            }
        };

        refresh.await.map_err(AppError::from)
    }
}

/// The one provider refresh call shared by all waiters.
///
/// `generation` is the session generation the refresh token was read under.
/// If the session changes meanwhile (logout, new login) the outcome is not
/// applied.
async fn run_refresh(
    inner: Arc<Inner>,
    refresh_token: String,
    generation: u64,
) -> Result<Session, RefreshFailure> {
    tracing::info!("Refreshing session");

    let outcome = match inner.provider.refresh_session(&refresh_token).await {
        Ok(session) => {
            if inner
                .install_if_current(session.clone(), AuthEvent::TokenRefreshed, Some(generation))
                .await
            {
                tracing::info!(
                    user_id = %session.user.id,
                    expires_at = %session.expires_at,
                    "Session refreshed"
                );
                Ok(session)
            } else {
                tracing::info!("Session changed during refresh, discarding new tokens");
                inner
                    .session
                    .read()
                    .await
                    .clone()
                    .ok_or(RefreshFailure::Superseded)
            }
        }
        Err(AppError::Auth(kind)) => {
            if inner.terminate_if_current(Some(generation)).await {
                tracing::warn!(kind = %kind, "Refresh token rejected, session ended");
            }
            Err(RefreshFailure::Rejected(kind))
        }
        Err(AppError::Network(msg)) => {
            tracing::warn!(error = %msg, "Session refresh could not reach provider");
            Err(RefreshFailure::Network(msg))
        }
        Err(AppError::MalformedResponse(msg)) => {
            tracing::warn!(reason = %msg, "Session refresh got a malformed response");
            Err(RefreshFailure::Malformed(msg))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Session refresh failed");
            Err(RefreshFailure::Other(e.to_string()))
        }
    };

    *inner.in_flight.lock().await = None;
    outcome
}
