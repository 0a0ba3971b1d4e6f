// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Response classification.
//!
//! Turns a raw HTTP response into one of four outcomes: JSON success, a
//! structured API error, a malformed payload (typically an HTML page from a
//! proxy or a misrouted URL), or a network failure. Pure functions only;
//! callers decide what to log.

use crate::error::{AppError, AuthErrorKind};
use crate::services::transport::{RawResponse, TransportError};
use serde_json::Value;

/// Reason used when markup arrives where JSON was expected.
pub const UNEXPECTED_HTML: &str = "unexpected-html";
/// Reason used when a success body is neither empty nor valid JSON.
pub const INVALID_JSON: &str = "invalid-json";

/// GoTrue error codes meaning the refresh token or session is gone.
const SESSION_GONE_CODES: &[&str] = &[
    "invalid_grant",
    "refresh_token_not_found",
    "refresh_token_already_used",
    "session_not_found",
    "session_expired",
];

/// Classified outcome of a single HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    Success(Value),
    ApiError(ApiFailure),
    Malformed(String),
    NetworkFailure(String),
}

/// What a non-2xx status means for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Auth(AuthErrorKind),
    NotFound,
    RateLimited,
    Server,
    Client,
}

/// Structured API error, enriched from the body when it parses.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiFailure {
    pub status: u16,
    pub kind: FailureKind,
    pub code: Option<String>,
    pub message: String,
}

impl ApiFailure {
    pub fn auth_kind(&self) -> Option<AuthErrorKind> {
        match self.kind {
            FailureKind::Auth(kind) => Some(kind),
            _ => None,
        }
    }
}

impl From<ApiFailure> for AppError {
    fn from(failure: ApiFailure) -> Self {
        match failure.kind {
            FailureKind::Auth(kind) => AppError::Auth(kind),
            FailureKind::NotFound => AppError::NotFound(failure.message),
            _ => AppError::Api {
                status: failure.status,
                code: failure.code,
                message: failure.message,
            },
        }
    }
}

impl Classified {
    /// Collapse into the crate error taxonomy.
    pub fn into_result(self) -> Result<Value, AppError> {
        match self {
            Classified::Success(value) => Ok(value),
            Classified::ApiError(failure) => Err(failure.into()),
            Classified::Malformed(reason) => Err(AppError::MalformedResponse(reason)),
            Classified::NetworkFailure(reason) => Err(AppError::Network(reason)),
        }
    }

    pub fn auth_kind(&self) -> Option<AuthErrorKind> {
        match self {
            Classified::ApiError(failure) => failure.auth_kind(),
            _ => None,
        }
    }
}

/// Classify a response whose body has been read.
pub fn classify(response: &RawResponse) -> Classified {
    let body = response.body.trim_start();
    let starts_with_markup = body.starts_with('<');

    // HTML masquerading as JSON wins over everything, status included.
    if claims_json(response.content_type.as_deref()) && starts_with_markup {
        return Classified::Malformed(UNEXPECTED_HTML.to_string());
    }

    let status = response.status;
    if !(200..300).contains(&status) {
        let parsed = if starts_with_markup {
            None
        } else {
            serde_json::from_str::<Value>(body).ok()
        };
        return Classified::ApiError(failure_from(status, parsed.as_ref()));
    }

    if body.trim_end().is_empty() {
        return Classified::Success(Value::Null);
    }
    if starts_with_markup {
        return Classified::Malformed(UNEXPECTED_HTML.to_string());
    }
    match serde_json::from_str::<Value>(body) {
        Ok(value) => Classified::Success(value),
        Err(_) => Classified::Malformed(INVALID_JSON.to_string()),
    }
}

/// Classify a failure that happened before a response arrived.
pub fn classify_transport_error(error: &TransportError) -> Classified {
    Classified::NetworkFailure(error.to_string())
}

fn claims_json(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.to_ascii_lowercase().contains("json"))
        .unwrap_or(false)
}

fn failure_from(status: u16, body: Option<&Value>) -> ApiFailure {
    let (code, message) = body.map(extract_error).unwrap_or((None, None));
    let message = message.unwrap_or_else(|| default_message(status));

    let kind = match auth_kind(status, code.as_deref(), &message) {
        Some(auth) => FailureKind::Auth(auth),
        None => match status {
            404 => FailureKind::NotFound,
            429 => FailureKind::RateLimited,
            s if s >= 500 => FailureKind::Server,
            _ => FailureKind::Client,
        },
    };

    ApiFailure {
        status,
        kind,
        code,
        message,
    }
}

fn auth_kind(status: u16, code: Option<&str>, message: &str) -> Option<AuthErrorKind> {
    let message = message.to_ascii_lowercase();
    let code = code.map(str::to_ascii_lowercase);
    let mentions_expiry = message.contains("expired")
        || code.as_deref().is_some_and(|c| c.contains("expired"));

    match status {
        401 if mentions_expiry => Some(AuthErrorKind::Expired),
        401 => Some(AuthErrorKind::Unauthorized),
        403 if mentions_expiry => Some(AuthErrorKind::Expired),
        403 => Some(AuthErrorKind::Forbidden),
        400 => {
            if code.as_deref() == Some("invalid_credentials")
                || message.contains("invalid login credentials")
            {
                Some(AuthErrorKind::Unauthorized)
            } else if code
                .as_deref()
                .is_some_and(|c| SESSION_GONE_CODES.contains(&c))
            {
                Some(AuthErrorKind::Expired)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Pull `(code, message)` out of the error shapes the backend produces.
fn extract_error(body: &Value) -> (Option<String>, Option<String>) {
    let text = |v: Option<&Value>| -> Option<String> {
        match v? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    };

    match body.get("error") {
        // {"error": {"message": "...", "code": "..."}}
        Some(Value::Object(inner)) => (
            text(inner.get("code")).or_else(|| text(inner.get("status"))),
            text(inner.get("message")),
        ),
        // {"error": "invalid_grant", "error_description": "..."}
        Some(Value::String(code)) => (
            Some(code.clone()),
            text(body.get("error_description"))
                .or_else(|| text(body.get("msg")))
                .or_else(|| text(body.get("message")))
                .or_else(|| Some(code.clone())),
        ),
        // {"msg": "...", "error_code": "..."} or {"message": "...", "code": "..."}
        _ => (
            text(body.get("error_code")).or_else(|| text(body.get("code"))),
            text(body.get("msg")).or_else(|| text(body.get("message"))),
        ),
    }
}

fn default_message(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(|r| format!("HTTP {}: {}", status, r))
        .unwrap_or_else(|| format!("HTTP {}", status))
}
