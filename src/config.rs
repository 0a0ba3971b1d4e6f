// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default margin before expiry at which the session is refreshed (5 minutes).
pub const DEFAULT_REFRESH_THRESHOLD_SECS: i64 = 5 * 60;

/// Largest accepted refresh threshold (one day).
pub const MAX_REFRESH_THRESHOLD_SECS: i64 = 24 * 60 * 60;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const MAX_HTTP_TIMEOUT_SECS: u64 = 600;
const DEFAULT_STORE_PATH: &str = ".wellness/store.json";

/// Client configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Project base URL, e.g. `https://abc.supabase.co` (no trailing slash)
    pub supabase_url: String,
    /// Public anonymous API key sent as `apikey` on every request
    pub supabase_anon_key: String,
    /// File that mirrors the session and offline data between runs
    pub store_path: PathBuf,
    /// Refresh the session once it is this close to expiry
    pub refresh_threshold_secs: i64,
    /// Per-request HTTP timeout
    pub http_timeout: Duration,
}

impl Config {
    /// Config for tests only; the URL points at nothing.
    pub fn test_default() -> Self {
        Self {
            supabase_url: "http://127.0.0.1:54321".to_string(),
            supabase_anon_key: "test_anon_key".to_string(),
            store_path: PathBuf::from("target/test-store.json"),
            refresh_threshold_secs: DEFAULT_REFRESH_THRESHOLD_SECS,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let supabase_url = env::var("SUPABASE_URL")
            .map_err(|_| ConfigError::Missing("SUPABASE_URL"))?
            .trim()
            .trim_end_matches('/')
            .to_string();
        if !supabase_url.starts_with("http://") && !supabase_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                name: "SUPABASE_URL",
                reason: "must start with http:// or https://".to_string(),
            });
        }

        let supabase_anon_key = env::var("SUPABASE_ANON_KEY")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("SUPABASE_ANON_KEY"))?;

        let store_path = env::var("WELLNESS_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORE_PATH));

        let refresh_threshold_secs = parse_var(
            "REFRESH_THRESHOLD_SECS",
            DEFAULT_REFRESH_THRESHOLD_SECS,
        )?;
        if !(0..=MAX_REFRESH_THRESHOLD_SECS).contains(&refresh_threshold_secs) {
            return Err(ConfigError::Invalid {
                name: "REFRESH_THRESHOLD_SECS",
                reason: format!("must be between 0 and {}", MAX_REFRESH_THRESHOLD_SECS),
            });
        }

        let http_timeout_secs = parse_var("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;
        if !(1..=MAX_HTTP_TIMEOUT_SECS).contains(&http_timeout_secs) {
            return Err(ConfigError::Invalid {
                name: "HTTP_TIMEOUT_SECS",
                reason: format!("must be between 1 and {}", MAX_HTTP_TIMEOUT_SECS),
            });
        }
        let http_timeout = Duration::from_secs(http_timeout_secs);

        Ok(Self {
            supabase_url,
            supabase_anon_key,
            store_path,
            refresh_threshold_secs,
            http_timeout,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            reason: format!("cannot parse '{}'", raw),
        }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
