//! Mood and activity aggregates for the dashboard.
//!
//! Computed client-side from whatever entries were fetched; nothing is
//! stored back to the backend.

use serde::Serialize;
use std::collections::HashMap;

use crate::models::{ActivityLog, MoodEntry};

/// Summary over a set of mood entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodSummary {
    pub count: usize,
    /// Mean mood, `None` when there are no entries
    pub average: Option<f64>,
    pub min: Option<u8>,
    pub max: Option<u8>,
    /// Mood of the most recent entry
    pub latest: Option<u8>,
    /// Occurrences per tag
    pub tags: HashMap<String, u32>,
}

impl MoodSummary {
    pub fn from_entries(entries: &[MoodEntry]) -> Self {
        let count = entries.len();
        let total: u32 = entries.iter().map(|e| u32::from(e.mood)).sum();

        let mut tags = HashMap::new();
        for tag in entries.iter().flat_map(|e| e.tags.iter()) {
            *tags.entry(tag.clone()).or_insert(0) += 1;
        }

        Self {
            count,
            average: (count > 0).then(|| f64::from(total) / count as f64),
            min: entries.iter().map(|e| e.mood).min(),
            max: entries.iter().map(|e| e.mood).max(),
            latest: entries.iter().max_by_key(|e| e.recorded_at).map(|e| e.mood),
            tags,
        }
    }
}

/// Total minutes per activity kind (keyed by the serialized kind name).
pub fn minutes_by_kind(logs: &[ActivityLog]) -> HashMap<String, u32> {
    let mut totals = HashMap::new();
    for log in logs {
        let key = serde_json::to_value(log.kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "other".to_string());
        *totals.entry(key).or_insert(0) += u32::from(log.duration_minutes);
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityKind, Intensity};
    use chrono::{Duration, Utc};

    fn mood(id: i64, value: u8, hours_ago: i64, tags: &[&str]) -> MoodEntry {
        MoodEntry {
            id,
            user_id: "u1".to_string(),
            recorded_at: Utc::now() - Duration::hours(hours_ago),
            mood: value,
            energy: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            note: None,
        }
    }

    #[test]
    fn test_summary_of_entries() {
        let entries = vec![
            mood(1, 4, 5, &["work"]),
            mood(2, 8, 1, &["friends", "work"]),
            mood(3, 6, 3, &[]),
        ];
        let summary = MoodSummary::from_entries(&entries);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.average, Some(6.0));
        assert_eq!(summary.min, Some(4));
        assert_eq!(summary.max, Some(8));
        assert_eq!(summary.latest, Some(8));
        assert_eq!(summary.tags.get("work"), Some(&2));
    }

    #[test]
    fn test_summary_of_nothing() {
        let summary = MoodSummary::from_entries(&[]);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.average, None);
        assert_eq!(summary.latest, None);
    }

    #[test]
    fn test_minutes_by_kind() {
        let log = |kind, minutes| ActivityLog {
            id: 1,
            user_id: "u1".to_string(),
            recorded_at: Utc::now(),
            kind,
            duration_minutes: minutes,
            intensity: Intensity::Low,
            note: None,
        };
        let totals = minutes_by_kind(&[
            log(ActivityKind::Walk, 30),
            log(ActivityKind::Walk, 15),
            log(ActivityKind::Yoga, 20),
        ]);
        assert_eq!(totals.get("walk"), Some(&45));
        assert_eq!(totals.get("yoga"), Some(&20));
    }
}
