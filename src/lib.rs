// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Wellness client: session handling and data access for a wellness app
//!
//! This crate signs users in against Supabase Auth, keeps the session fresh
//! (one refresh at a time, however many callers), classifies backend responses
//! so misrouted HTML never masquerades as data, and reads/writes profile, mood,
//! and activity records with an offline fallback.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
pub mod time_utils;

use config::Config;
use db::LocalStore;
use error::AppError;
use middleware::RequestPipeline;
use services::{ApiClient, ReqwestTransport, SessionManager, SupabaseAuth, Transport, WellnessService};
use std::sync::Arc;

/// Shared client state.
pub struct AppState {
    pub config: Config,
    pub store: LocalStore,
    pub sessions: SessionManager,
    pub api: ApiClient,
    pub wellness: WellnessService,
}

impl AppState {
    /// Build the client stack over the real HTTP transport.
    pub async fn init(config: Config) -> Result<Self, AppError> {
        let store = LocalStore::open(&config.store_path).await?;
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(config.http_timeout)?);
        Ok(Self::with_transport(config, store, transport))
    }

    /// Build the client stack over any transport (tests use scripted ones).
    pub fn with_transport(config: Config, store: LocalStore, transport: Arc<dyn Transport>) -> Self {
        let pipeline = RequestPipeline::standard(&config.supabase_anon_key);

        let provider = Arc::new(SupabaseAuth::new(
            &config.supabase_url,
            transport.clone(),
            pipeline.clone(),
        ));
        let sessions = SessionManager::new(provider, store.clone(), config.refresh_threshold_secs);
        let api = ApiClient::new(&config.supabase_url, transport, pipeline, sessions.clone());
        let wellness = WellnessService::new(api.clone(), store.clone());

        Self {
            config,
            store,
            sessions,
            api,
            wellness,
        }
    }
}
