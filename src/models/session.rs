// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authenticated session and auth state events.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Free-form metadata supplied at sign-up (`user_metadata`)
    #[serde(default, rename = "user_metadata")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl SessionUser {
    /// Display name from metadata, if one was set.
    pub fn display_name(&self) -> Option<&str> {
        self.metadata.get("display_name").and_then(|v| v.as_str())
    }
}

/// Bearer-token credential plus expiry for the current login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
    pub user: SessionUser,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// Seconds left before the access token expires (negative once expired).
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds()
    }

    /// True when the time to expiry no longer exceeds `threshold_secs`.
    /// A threshold reaching past the representable range always refreshes.
    pub fn needs_refresh(&self, now: DateTime<Utc>, threshold_secs: i64) -> bool {
        Duration::try_seconds(threshold_secs)
            .and_then(|threshold| now.checked_add_signed(threshold))
            .map_or(true, |deadline| deadline >= self.expires_at)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Kind of auth state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// Payload broadcast whenever session state transitions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthStateChange {
    pub event: AuthEvent,
    pub is_authenticated: bool,
    pub user: Option<SessionUser>,
}

impl AuthStateChange {
    pub fn new(event: AuthEvent, session: Option<&Session>) -> Self {
        Self {
            event,
            is_authenticated: session.is_some(),
            user: session.map(|s| s.user.clone()),
        }
    }
}
