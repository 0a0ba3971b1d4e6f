// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use validator::Validate;
use wellness_client::error::{AppError, AuthErrorKind};
use wellness_client::models::{Credentials, NewMoodEntry};

#[test]
fn test_is_auth_error_matches() {
    assert!(AppError::Auth(AuthErrorKind::Expired).is_auth_error());
    assert!(AppError::Auth(AuthErrorKind::Unauthorized).is_auth_error());
    assert!(AppError::Auth(AuthErrorKind::Forbidden).is_auth_error());
    assert!(AppError::NotAuthenticated.is_auth_error());
}

#[test]
fn test_is_auth_error_no_match() {
    assert!(!AppError::Network("connection refused".to_string()).is_auth_error());
    assert!(!AppError::MalformedResponse("unexpected-html".to_string()).is_auth_error());
    let err = AppError::Api {
        status: 401,
        code: None,
        message: "looks like auth but was not classified as such".to_string(),
    };
    assert!(!err.is_auth_error());
}

#[test]
fn test_is_network_error() {
    assert!(AppError::Network("timed out".to_string()).is_network_error());
    assert!(!AppError::Auth(AuthErrorKind::Expired).is_network_error());
    assert!(!AppError::NotFound("Profile".to_string()).is_network_error());
}

#[test]
fn test_user_messages() {
    assert_eq!(
        AppError::Auth(AuthErrorKind::Expired).user_message(),
        "Your session has ended. Please sign in again."
    );
    assert_eq!(
        AppError::NotAuthenticated.user_message(),
        AppError::Auth(AuthErrorKind::Expired).user_message()
    );
    assert_eq!(
        AppError::Auth(AuthErrorKind::Unauthorized).user_message(),
        "Incorrect email or password."
    );
    assert_eq!(
        AppError::NotFound("Profile".to_string()).user_message(),
        "Profile was not found."
    );
    // Internal details stay out of user-facing text.
    let internal = AppError::Internal(anyhow::anyhow!("lock poisoned at 0xdeadbeef"));
    assert_eq!(internal.user_message(), "Something went wrong.");
}

#[test]
fn test_validation_errors_are_sorted_by_field() {
    let credentials = Credentials {
        email: "nope".to_string(),
        password: "123".to_string(),
    };
    let err: AppError = credentials.validate().unwrap_err().into();
    match err {
        AppError::Validation(msg) => assert_eq!(
            msg,
            "email must be a valid email address; password must be at least 6 characters"
        ),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_validation_error_message_is_user_message() {
    let err: AppError = NewMoodEntry::new(0).validate().unwrap_err().into();
    assert_eq!(err.user_message(), "mood must be between 1 and 10");
}
