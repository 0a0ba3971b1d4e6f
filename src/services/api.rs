// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authenticated request wrapper.
//!
//! Every backend call goes through `ApiClient::execute`:
//! - pipeline layers are applied and the bearer token attached
//! - the response is classified
//! - an auth rejection triggers one (deduplicated) session refresh and exactly
//!   one retry; nothing is ever retried twice
//! - malformed responses are surfaced as-is, never retried

use crate::error::AppError;
use crate::middleware::{attach_bearer, RequestPipeline};
use crate::models::Session;
use crate::services::classifier::{classify, classify_transport_error, Classified};
use crate::services::session::SessionManager;
use crate::services::transport::{ApiRequest, Transport};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Original send plus at most one retry.
const MAX_ATTEMPTS: u8 = 2;

/// Per-call progress, logged at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Sent,
    Classified,
    Refreshing,
    Retry,
    Terminal,
}

/// Backend client that attaches credentials and recovers from expired tokens.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    pipeline: RequestPipeline,
    sessions: SessionManager,
    base_url: String,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        transport: Arc<dyn Transport>,
        pipeline: RequestPipeline,
        sessions: SessionManager,
    ) -> Self {
        Self {
            transport,
            pipeline,
            sessions,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// PostgREST URL for `path` (table name plus optional query string).
    pub fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send `request` and return the parsed JSON body.
    pub async fn execute(&self, request: ApiRequest) -> Result<Value, AppError> {
        let mut session = self.sessions.refresh_if_needed().await?;

        for attempt in 1..=MAX_ATTEMPTS {
            let classified = self.dispatch(&request, session.as_ref(), attempt).await;
            let is_last = attempt == MAX_ATTEMPTS;

            match classified {
                Classified::ApiError(failure) if failure.auth_kind().is_some() && !is_last => {
                    // Without a token there is nothing to refresh.
                    let Some(rejected) = session.as_ref() else {
                        log_terminal(&request, attempt, "auth error without session");
                        return Err(failure.into());
                    };

                    tracing::debug!(
                        phase = ?Phase::Refreshing,
                        url = request.path_for_log(),
                        status = failure.status,
                        "Request rejected, recovering session"
                    );
                    match self.sessions.recover_from_rejection(&rejected.access_token).await {
                        Ok(fresh) => {
                            tracing::debug!(
                                phase = ?Phase::Retry,
                                url = request.path_for_log(),
                                "Retrying with refreshed session"
                            );
                            session = Some(fresh);
                        }
                        Err(e) => {
                            log_terminal(&request, attempt, "session recovery failed");
                            return Err(e);
                        }
                    }
                }
                Classified::Malformed(reason) => {
                    tracing::warn!(
                        url = request.path_for_log(),
                        reason = %reason,
                        "Backend returned a non-JSON payload"
                    );
                    log_terminal(&request, attempt, "malformed");
                    return Err(AppError::MalformedResponse(reason));
                }
                other => {
                    log_terminal(&request, attempt, "classified");
                    return other.into_result();
                }
            }
        }

        // The final attempt always returns from inside the loop.
        Err(AppError::Internal(anyhow::anyhow!(
            "request loop ended without a result"
        )))
    }

    /// `execute` and deserialize the body.
    pub async fn execute_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, AppError> {
        let value = self.execute(request).await?;
        serde_json::from_value(value)
            .map_err(|e| AppError::MalformedResponse(format!("unexpected-shape: {}", e)))
    }

    async fn dispatch(&self, request: &ApiRequest, session: Option<&Session>, attempt: u8) -> Classified {
        let mut outgoing = request.clone();
        self.pipeline.apply(&mut outgoing);
        if let Some(session) = session {
            attach_bearer(&mut outgoing, session);
        }

        tracing::debug!(
            phase = ?Phase::Sent,
            method = %outgoing.method,
            url = outgoing.path_for_log(),
            attempt,
            authenticated = session.is_some(),
            "API request"
        );

        let classified = match self.transport.send(&outgoing).await {
            Ok(response) => classify(&response),
            Err(e) => classify_transport_error(&e),
        };

        tracing::debug!(
            phase = ?Phase::Classified,
            url = outgoing.path_for_log(),
            outcome = outcome_label(&classified),
            "API response"
        );
        classified
    }
}

fn log_terminal(request: &ApiRequest, attempt: u8, reason: &str) {
    tracing::debug!(
        phase = ?Phase::Terminal,
        url = request.path_for_log(),
        attempt,
        reason,
        "Request finished"
    );
}

fn outcome_label(classified: &Classified) -> &'static str {
    match classified {
        Classified::Success(_) => "success",
        Classified::ApiError(f) if f.auth_kind().is_some() => "auth_error",
        Classified::ApiError(_) => "api_error",
        Classified::Malformed(_) => "malformed",
        Classified::NetworkFailure(_) => "network_failure",
    }
}
