// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent user-facing messages.

use std::fmt;

/// Sub-kinds of authentication failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// No or invalid credentials (HTTP 401).
    Unauthorized,
    /// Credentials valid but not permitted (HTTP 403).
    Forbidden,
    /// Access or refresh token expired or revoked.
    Expired,
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuthErrorKind::Unauthorized => "unauthorized",
            AuthErrorKind::Forbidden => "forbidden",
            AuthErrorKind::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Network failure: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(AuthErrorKind),

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("API error {status}: {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Local storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True for errors that mean the user has to sign in (again).
    pub fn is_auth_error(&self) -> bool {
        matches!(self, AppError::Auth(_) | AppError::NotAuthenticated)
    }

    /// True when the backend could not be reached at all.
    pub fn is_network_error(&self) -> bool {
        matches!(self, AppError::Network(_))
    }

    /// Short message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Network(_) => {
                "You appear to be offline. Please check your connection.".to_string()
            }
            AppError::Auth(AuthErrorKind::Expired) | AppError::NotAuthenticated => {
                "Your session has ended. Please sign in again.".to_string()
            }
            AppError::Auth(AuthErrorKind::Unauthorized) => {
                "Incorrect email or password.".to_string()
            }
            AppError::Auth(AuthErrorKind::Forbidden) => {
                "You do not have permission to do that.".to_string()
            }
            AppError::MalformedResponse(_) => {
                "The service is temporarily unavailable. Please try again later.".to_string()
            }
            AppError::Api { message, .. } => message.clone(),
            AppError::NotFound(what) => format!("{} was not found.", what),
            AppError::Validation(msg) => msg.clone(),
            AppError::Storage(err) => {
                tracing::error!(error = %err, "Local storage error");
                "Could not save data on this device.".to_string()
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal error");
                "Something went wrong.".to_string()
            }
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let detail = errs
                    .iter()
                    .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "is invalid".to_string());
                format!("{} {}", field, detail)
            })
            .collect();
        fields.sort();
        AppError::Validation(fields.join("; "))
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, AppError>;
