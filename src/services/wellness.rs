// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile, mood, and activity data.
//!
//! Reads and writes go through `ApiClient` to the PostgREST tables
//! `profiles`, `mood_entries`, and `activity_logs`. When the backend is
//! unreachable the last profile is served from the local store, and new
//! wellness records are queued there until `sync_pending` succeeds.

use crate::db::LocalStore;
use crate::error::AppError;
use crate::models::stats::minutes_by_kind;
use crate::models::{
    ActivityLog, MoodEntry, MoodSummary, NewActivity, NewMoodEntry, PendingRecord, Profile,
    ProfileUpdate, Recorded, SessionUser,
};
use crate::services::api::ApiClient;
use crate::services::transport::ApiRequest;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use validator::Validate;

/// Most rows a list call will ask for.
pub const MAX_LIST_LIMIT: u32 = 500;

const PROFILES: &str = "profiles";
const MOOD_ENTRIES: &str = "mood_entries";
const ACTIVITY_LOGS: &str = "activity_logs";

/// Outcome of replaying queued records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub sent: usize,
    /// Records the backend refused outright; dropped from the queue
    pub rejected: usize,
    pub remaining: usize,
}

/// High-level wellness data service.
#[derive(Clone)]
pub struct WellnessService {
    api: ApiClient,
    store: LocalStore,
    /// One replay of the offline queue at a time
    sync_lock: Arc<Mutex<()>>,
}

impl WellnessService {
    pub fn new(api: ApiClient, store: LocalStore) -> Self {
        Self {
            api,
            store,
            sync_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn require_user(&self) -> Result<SessionUser, AppError> {
        self.api
            .sessions()
            .current_user()
            .await
            .ok_or(AppError::NotAuthenticated)
    }

    // ─── Profile ─────────────────────────────────────────────────────────────

    /// Fetch the signed-in user's profile, falling back to the cached copy
    /// when the backend is unreachable.
    pub async fn get_profile(&self) -> Result<Profile, AppError> {
        let user = self.require_user().await?;
        let url = self.api.rest_url(&format!(
            "{}?id=eq.{}&select=*",
            PROFILES,
            urlencoding::encode(&user.id)
        ));

        match self.api.execute_json::<Vec<Profile>>(ApiRequest::get(url)).await {
            Ok(rows) => {
                let profile = rows
                    .into_iter()
                    .next()
                    .ok_or_else(|| AppError::NotFound(format!("Profile for user {}", user.id)))?;
                if let Err(e) = self.store.cache_profile(&profile).await {
                    tracing::warn!(error = %e, "Failed to cache profile");
                }
                Ok(profile)
            }
            Err(e) if e.is_network_error() => match self.store.cached_profile(&user.id) {
                Some(cached) => {
                    tracing::info!(user_id = %user.id, "Backend unreachable, serving cached profile");
                    Ok(cached)
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    /// Create the profile row for a new user if it does not exist yet.
    pub async fn ensure_profile(&self) -> Result<Profile, AppError> {
        let user = self.require_user().await?;
        let body = json!({
            "id": user.id,
            "email": user.email,
            "display_name": user.display_name(),
        });

        let request = ApiRequest::post(self.api.rest_url(PROFILES))
            .with_header("Prefer", "resolution=ignore-duplicates,return=representation")
            .with_json(body);

        let rows: Vec<Profile> = self.api.execute_json(request).await?;
        match rows.into_iter().next() {
            Some(profile) => {
                tracing::info!(user_id = %profile.id, "Profile created");
                Ok(profile)
            }
            // Duplicate ignored: the row already existed
            None => self.get_profile().await,
        }
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, AppError> {
        update.validate()?;
        if update.is_empty() {
            return Err(AppError::Validation("nothing to update".to_string()));
        }

        let user = self.require_user().await?;
        let url = self.api.rest_url(&format!(
            "{}?id=eq.{}",
            PROFILES,
            urlencoding::encode(&user.id)
        ));
        let body = serde_json::to_value(update)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode update: {}", e)))?;
        let request = ApiRequest::patch(url)
            .with_header("Prefer", "return=representation")
            .with_json(body);

        let rows: Vec<Profile> = self.api.execute_json(request).await?;
        let profile = rows
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("Profile for user {}", user.id)))?;

        if let Err(e) = self.store.cache_profile(&profile).await {
            tracing::warn!(error = %e, "Failed to cache profile");
        }
        tracing::info!(user_id = %profile.id, "Profile updated");
        Ok(profile)
    }

    // ─── Mood entries ────────────────────────────────────────────────────────

    pub async fn add_mood(&self, entry: NewMoodEntry) -> Result<Recorded<MoodEntry>, AppError> {
        entry.validate()?;
        let user = self.require_user().await?;

        match self.insert(MOOD_ENTRIES, &user.id, &entry).await {
            Ok(saved) => Ok(Recorded::Saved(saved)),
            Err(e) if e.is_network_error() => {
                let queued = self.store.push_pending(PendingRecord::Mood(entry)).await?;
                tracing::info!(queued, "Backend unreachable, mood entry queued");
                Ok(Recorded::Queued)
            }
            Err(e) => Err(e),
        }
    }

    /// Most recent mood entries first.
    pub async fn list_moods(&self, limit: u32) -> Result<Vec<MoodEntry>, AppError> {
        self.list(MOOD_ENTRIES, limit).await
    }

    pub async fn mood_summary(&self, limit: u32) -> Result<MoodSummary, AppError> {
        let entries = self.list_moods(limit).await?;
        Ok(MoodSummary::from_entries(&entries))
    }

    // ─── Activity logs ───────────────────────────────────────────────────────

    pub async fn log_activity(
        &self,
        activity: NewActivity,
    ) -> Result<Recorded<ActivityLog>, AppError> {
        activity.validate()?;
        let user = self.require_user().await?;

        match self.insert(ACTIVITY_LOGS, &user.id, &activity).await {
            Ok(saved) => Ok(Recorded::Saved(saved)),
            Err(e) if e.is_network_error() => {
                let queued = self
                    .store
                    .push_pending(PendingRecord::Activity(activity))
                    .await?;
                tracing::info!(queued, "Backend unreachable, activity queued");
                Ok(Recorded::Queued)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn list_activities(&self, limit: u32) -> Result<Vec<ActivityLog>, AppError> {
        self.list(ACTIVITY_LOGS, limit).await
    }

    /// Total minutes per activity kind over the most recent `limit` logs.
    pub async fn activity_minutes(&self, limit: u32) -> Result<HashMap<String, u32>, AppError> {
        let logs = self.list_activities(limit).await?;
        Ok(minutes_by_kind(&logs))
    }

    // ─── Offline queue ───────────────────────────────────────────────────────

    pub fn pending_count(&self) -> usize {
        self.store.pending().len()
    }

    /// Send queued records in order.
    ///
    /// Stops at the first network failure and keeps the rest. A record the
    /// backend refuses with a client error (bad data, constraint violation)
    /// can never succeed, so it is logged and dropped instead of blocking
    /// everything queued behind it. Any other error stops the replay and is
    /// returned after saving progress. Records queued while a sync is running
    /// stay in the queue.
    pub async fn sync_pending(&self) -> Result<SyncReport, AppError> {
        let _sync = self.sync_lock.lock().await;

        let pending = self.store.pending();
        if pending.is_empty() {
            return Ok(SyncReport::default());
        }
        let user = self.require_user().await?;

        let mut report = SyncReport::default();
        let mut failure = None;
        for record in &pending {
            let result = match record {
                PendingRecord::Mood(entry) => self
                    .insert::<_, MoodEntry>(MOOD_ENTRIES, &user.id, entry)
                    .await
                    .map(|_| ()),
                PendingRecord::Activity(activity) => self
                    .insert::<_, ActivityLog>(ACTIVITY_LOGS, &user.id, activity)
                    .await
                    .map(|_| ()),
            };
            match result {
                Ok(()) => report.sent += 1,
                Err(e) if is_permanent_rejection(&e) => {
                    tracing::warn!(error = %e, record = ?record, "Backend refused queued record, dropping it");
                    report.rejected += 1;
                }
                Err(e) if e.is_network_error() => {
                    tracing::info!(sent = report.sent, "Backend still unreachable, sync paused");
                    break;
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        // Only the processed prefix is removed; anything appended meanwhile stays.
        let processed = &pending[..report.sent + report.rejected];
        report.remaining = self
            .store
            .update_pending(|queue| {
                let done = queue
                    .iter()
                    .zip(processed)
                    .take_while(|(queued, sent)| queued == sent)
                    .count();
                queue.drain(..done);
                queue.len()
            })
            .await?;
        tracing::info!(
            sent = report.sent,
            rejected = report.rejected,
            remaining = report.remaining,
            "Offline queue synced"
        );

        match failure {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    // ─── Helpers ─────────────────────────────────────────────────────────────

    async fn insert<B, T>(&self, table: &str, user_id: &str, record: &B) -> Result<T, AppError>
    where
        B: serde::Serialize,
        T: DeserializeOwned,
    {
        let mut body = serde_json::to_value(record)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode record: {}", e)))?;
        if let Some(obj) = body.as_object_mut() {
            obj.insert("user_id".to_string(), json!(user_id));
        }

        let request = ApiRequest::post(self.api.rest_url(table))
            .with_header("Prefer", "return=representation")
            .with_json(body);

        let rows: Vec<T> = self.api.execute_json(request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::MalformedResponse("empty-insert-result".to_string()))
    }

    async fn list<T: DeserializeOwned>(&self, table: &str, limit: u32) -> Result<Vec<T>, AppError> {
        let user = self.require_user().await?;
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        let url = self.api.rest_url(&format!(
            "{}?user_id=eq.{}&order=recorded_at.desc&limit={}",
            table,
            urlencoding::encode(&user.id),
            limit
        ));
        self.api.execute_json(ApiRequest::get(url)).await
    }
}

/// Client errors other than auth, timeouts, and rate limiting mean the
/// record itself is unacceptable.
fn is_permanent_rejection(error: &AppError) -> bool {
    matches!(
        error,
        AppError::Api { status, .. }
            if (400..500).contains(status) && !matches!(*status, 408 | 429)
    )
}
