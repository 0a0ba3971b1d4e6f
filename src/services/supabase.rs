// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Supabase Auth (GoTrue) client.
//!
//! Handles:
//! - Password sign-in and sign-up
//! - Token refresh
//! - Sign-out and password recovery
//! - Reading and updating the signed-in user

use crate::error::AppError;
use crate::middleware::RequestPipeline;
use crate::models::{Session, SessionUser};
use crate::services::classifier::{classify, classify_transport_error};
use crate::services::transport::{ApiRequest, Transport};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use std::sync::Arc;

/// Operations consumed from the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<SignUpOutcome, AppError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError>;

    async fn get_user(&self, access_token: &str) -> Result<SessionUser, AppError>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AppError>;

    async fn reset_password(&self, email: &str) -> Result<(), AppError>;

    async fn update_user(
        &self,
        access_token: &str,
        metadata: serde_json::Value,
    ) -> Result<SessionUser, AppError>;
}

/// Result of a sign-up.
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    /// Auto-confirmed project: the user is signed in right away
    SignedIn(Session),
    /// Email confirmation pending; no session yet
    ConfirmationRequired(SessionUser),
}

/// GoTrue REST client.
#[derive(Clone)]
pub struct SupabaseAuth {
    transport: Arc<dyn Transport>,
    pipeline: RequestPipeline,
    auth_url: String,
}

impl SupabaseAuth {
    /// `base_url` is the project URL; requests go to `{base_url}/auth/v1`.
    pub fn new(base_url: &str, transport: Arc<dyn Transport>, pipeline: RequestPipeline) -> Self {
        Self {
            transport,
            pipeline,
            auth_url: format!("{}/auth/v1", base_url.trim_end_matches('/')),
        }
    }

    async fn send(&self, mut request: ApiRequest) -> Result<serde_json::Value, AppError> {
        self.pipeline.apply(&mut request);
        tracing::debug!(method = %request.method, url = request.path_for_log(), "Auth request");

        let classified = match self.transport.send(&request).await {
            Ok(response) => classify(&response),
            Err(e) => classify_transport_error(&e),
        };
        classified.into_result()
    }

    async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, AppError> {
        let value = self.send(request).await?;
        parse_body(value)
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let request = ApiRequest::post(format!("{}/token?grant_type=password", self.auth_url))
            .with_json(json!({ "email": email, "password": password }));

        let tokens: TokenResponse = self.send_json(request).await?;
        let session = tokens.into_session()?;
        tracing::info!(user_id = %session.user.id, "Signed in with password");
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<SignUpOutcome, AppError> {
        let request = ApiRequest::post(format!("{}/signup", self.auth_url)).with_json(json!({
            "email": email,
            "password": password,
            "data": metadata,
        }));

        let value = self.send(request).await?;
        if value.get("access_token").is_some() {
            let tokens: TokenResponse = parse_body(value)?;
            return Ok(SignUpOutcome::SignedIn(tokens.into_session()?));
        }

        // Confirmation flow: the body is the user, sometimes wrapped in {"user": ...}
        let user_value = match value.get("user") {
            Some(inner) if inner.is_object() => inner.clone(),
            _ => value,
        };
        let user: SessionUser = parse_body(user_value)?;
        tracing::info!(user_id = %user.id, "Sign-up pending email confirmation");
        Ok(SignUpOutcome::ConfirmationRequired(user))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        let request = ApiRequest::post(format!("{}/logout", self.auth_url))
            .with_header("Authorization", format!("Bearer {}", access_token));
        self.send(request).await?;
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<SessionUser, AppError> {
        let request = ApiRequest::get(format!("{}/user", self.auth_url))
            .with_header("Authorization", format!("Bearer {}", access_token));
        self.send_json(request).await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AppError> {
        let request = ApiRequest::post(format!(
            "{}/token?grant_type=refresh_token",
            self.auth_url
        ))
        .with_json(json!({ "refresh_token": refresh_token }));

        let tokens: TokenResponse = self.send_json(request).await?;
        tokens.into_session()
    }

    async fn reset_password(&self, email: &str) -> Result<(), AppError> {
        let request = ApiRequest::post(format!("{}/recover", self.auth_url))
            .with_json(json!({ "email": email }));
        self.send(request).await?;
        tracing::info!("Password recovery email requested");
        Ok(())
    }

    async fn update_user(
        &self,
        access_token: &str,
        metadata: serde_json::Value,
    ) -> Result<SessionUser, AppError> {
        let request = ApiRequest::put(format!("{}/user", self.auth_url))
            .with_header("Authorization", format!("Bearer {}", access_token))
            .with_json(json!({ "data": metadata }));
        self.send_json(request).await
    }
}

fn parse_body<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, AppError> {
    serde_json::from_value(value)
        .map_err(|e| AppError::MalformedResponse(format!("unexpected-shape: {}", e)))
}

/// Token grant response from GoTrue.
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: SessionUser,
}

impl TokenResponse {
    fn into_session(self) -> Result<Session, AppError> {
        if self.expires_at.is_none() && self.expires_in.is_none() {
            return Err(AppError::MalformedResponse("missing-expiry".to_string()));
        }
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .or_else(|| {
                self.expires_in
                    .and_then(Duration::try_seconds)
                    .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            })
            .ok_or_else(|| AppError::MalformedResponse("invalid-expiry".to_string()))?;

        Ok(Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_at,
            user: self.user,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_falls_back_to_expires_in() {
        let tokens: TokenResponse = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "user": { "id": "u1" }
        }))
        .unwrap();

        let session = tokens.into_session().unwrap();
        let left = session.seconds_until_expiry(Utc::now());
        assert!((3590..=3600).contains(&left), "left = {}", left);
        assert_eq!(session.token_type, "bearer");
    }

    #[test]
    fn test_missing_expiry_is_malformed() {
        let tokens: TokenResponse = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "user": { "id": "u1" }
        }))
        .unwrap();

        assert!(matches!(
            tokens.into_session(),
            Err(AppError::MalformedResponse(reason)) if reason == "missing-expiry"
        ));
    }

    #[test]
    fn test_out_of_range_expiry_is_malformed() {
        for expiry in [json!({ "expires_in": i64::MAX }), json!({ "expires_at": i64::MAX })] {
            let mut body = json!({
                "access_token": "a",
                "refresh_token": "r",
                "user": { "id": "u1" }
            });
            for (key, value) in expiry.as_object().unwrap() {
                body[key] = value.clone();
            }
            let tokens: TokenResponse = serde_json::from_value(body).unwrap();

            assert!(matches!(
                tokens.into_session(),
                Err(AppError::MalformedResponse(reason)) if reason == "invalid-expiry"
            ));
        }
    }
}
