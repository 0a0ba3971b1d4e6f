// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mood entries and activity logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Stored mood entry (row of `mood_entries`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodEntry {
    pub id: i64,
    pub user_id: String,
    pub recorded_at: DateTime<Utc>,
    /// 1 (worst) to 10 (best)
    pub mood: u8,
    #[serde(default)]
    pub energy: Option<u8>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Mood entry as submitted by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewMoodEntry {
    #[validate(range(min = 1, max = 10, message = "must be between 1 and 10"))]
    pub mood: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 10, message = "must be between 1 and 10"))]
    pub energy: Option<u8>,
    #[serde(default)]
    #[validate(length(max = 10, message = "at most 10 tags"))]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl NewMoodEntry {
    pub fn new(mood: u8) -> Self {
        Self {
            mood,
            energy: None,
            tags: Vec::new(),
            note: None,
            recorded_at: Utc::now(),
        }
    }
}

/// Kind of logged activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Walk,
    Run,
    Yoga,
    Meditation,
    Workout,
    Sleep,
    Other,
}

impl std::str::FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "walk" => Ok(Self::Walk),
            "run" => Ok(Self::Run),
            "yoga" => Ok(Self::Yoga),
            "meditation" => Ok(Self::Meditation),
            "workout" => Ok(Self::Workout),
            "sleep" => Ok(Self::Sleep),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown activity kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Low,
    Moderate,
    High,
}

impl std::str::FromStr for Intensity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "moderate" => Ok(Self::Moderate),
            "high" => Ok(Self::High),
            other => Err(format!("unknown intensity: {}", other)),
        }
    }
}

/// Stored activity log (row of `activity_logs`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: i64,
    pub user_id: String,
    pub recorded_at: DateTime<Utc>,
    pub kind: ActivityKind,
    pub duration_minutes: u16,
    pub intensity: Intensity,
    #[serde(default)]
    pub note: Option<String>,
}

/// Activity log as submitted by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewActivity {
    pub kind: ActivityKind,
    #[validate(range(min = 1, max = 1440, message = "must be between 1 and 1440 minutes"))]
    pub duration_minutes: u16,
    pub intensity: Intensity,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// A record that could not be sent and waits in the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "record", rename_all = "snake_case")]
pub enum PendingRecord {
    Mood(NewMoodEntry),
    Activity(NewActivity),
}

/// Outcome of a write that may have been deferred.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded<T> {
    /// Stored by the backend
    Saved(T),
    /// Backend unreachable; kept locally until the next sync
    Queued,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mood_range_validation() {
        assert!(NewMoodEntry::new(7).validate().is_ok());
        assert!(NewMoodEntry::new(0).validate().is_err());
        assert!(NewMoodEntry::new(11).validate().is_err());

        let mut entry = NewMoodEntry::new(5);
        entry.energy = Some(12);
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_activity_kind_parse() {
        assert_eq!("Yoga".parse::<ActivityKind>().unwrap(), ActivityKind::Yoga);
        assert!("skydiving".parse::<ActivityKind>().is_err());
        assert_eq!("HIGH".parse::<Intensity>().unwrap(), Intensity::High);
    }

    #[test]
    fn test_pending_record_is_tagged() {
        let record = PendingRecord::Mood(NewMoodEntry::new(4));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "mood");
        assert_eq!(json["record"]["mood"], 4);
    }
}
