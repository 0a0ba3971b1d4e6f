// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local key/value store mirroring session and offline data on disk.
//!
//! Everything here is a cache: the backend stays the source of truth. A
//! missing or corrupt file simply yields an empty store.

use crate::db::keys;
use crate::error::AppError;
use crate::models::{PendingRecord, Profile, Session};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// JSON-backed local store.
#[derive(Clone)]
pub struct LocalStore {
    entries: Arc<DashMap<String, serde_json::Value>>,
    /// None in memory-only mode
    path: Option<PathBuf>,
    /// Serializes file writes
    write_lock: Arc<Mutex<()>>,
}

impl LocalStore {
    /// Open (or lazily create) the store file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();
        let entries = DashMap::new();

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                match serde_json::from_slice::<BTreeMap<String, serde_json::Value>>(&bytes) {
                    Ok(map) => {
                        for (key, value) in map {
                            entries.insert(key, value);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Local store is corrupt, starting empty"
                        );
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(AppError::Storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        }

        tracing::debug!(path = %path.display(), keys = entries.len(), "Local store opened");

        Ok(Self {
            entries: Arc::new(entries),
            path: Some(path),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Create a memory-only store (tests, or when no disk is wanted).
    pub fn new_mock() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            path: None,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.entries.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key, error = %e, "Ignoring unreadable local store entry");
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), AppError> {
        let value = serde_json::to_value(value)
            .map_err(|e| AppError::Storage(format!("Failed to serialize {}: {}", key, e)))?;
        self.entries.insert(key.to_string(), value);
        self.flush().await
    }

    // ─── Typed accessors ─────────────────────────────────────────────────────

    pub fn session(&self) -> Option<Session> {
        self.get(keys::SESSION)
    }

    pub async fn set_session(&self, session: &Session) -> Result<(), AppError> {
        self.set(keys::SESSION, session).await
    }

    /// Cached profile, only if it belongs to `user_id`.
    pub fn cached_profile(&self, user_id: &str) -> Option<Profile> {
        self.get::<Profile>(keys::PROFILE_CACHE)
            .filter(|p| p.id == user_id)
    }

    pub async fn cache_profile(&self, profile: &Profile) -> Result<(), AppError> {
        self.set(keys::PROFILE_CACHE, profile).await
    }

    pub fn pending(&self) -> Vec<PendingRecord> {
        self.get(keys::PENDING_RECORDS).unwrap_or_default()
    }

    pub async fn push_pending(&self, record: PendingRecord) -> Result<usize, AppError> {
        self.update_pending(|pending| {
            pending.push(record);
            pending.len()
        })
        .await
    }

    /// Read, modify, and write back the offline queue as one step.
    ///
    /// Concurrent updates are serialized on the write lock, so a record
    /// queued while another update is in progress is never lost.
    pub async fn update_pending<R>(
        &self,
        update: impl FnOnce(&mut Vec<PendingRecord>) -> R,
    ) -> Result<R, AppError> {
        let _guard = self.write_lock.lock().await;

        let mut pending = self.pending();
        let result = update(&mut pending);
        if pending.is_empty() {
            self.entries.remove(keys::PENDING_RECORDS);
        } else {
            let value = serde_json::to_value(&pending).map_err(|e| {
                AppError::Storage(format!("Failed to serialize pending records: {}", e))
            })?;
            self.entries.insert(keys::PENDING_RECORDS.to_string(), value);
        }

        self.write_snapshot().await?;
        Ok(result)
    }

    /// Drop everything tied to the signed-in user.
    pub async fn clear_user_data(&self) -> Result<(), AppError> {
        self.entries.remove(keys::SESSION);
        self.entries.remove(keys::PROFILE_CACHE);
        self.flush().await
    }

    async fn flush(&self) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        self.write_snapshot().await
    }

    /// Write the whole map to disk via a temp file and rename.
    /// Callers hold `write_lock`.
    async fn write_snapshot(&self) -> Result<(), AppError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let snapshot: BTreeMap<String, serde_json::Value> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| AppError::Storage(format!("Failed to serialize store: {}", e)))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to create {}: {}", parent.display(), e)))?;
        }

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to replace {}: {}", path.display(), e)))?;

        Ok(())
    }
}
