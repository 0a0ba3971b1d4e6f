// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod session;
pub mod stats;
pub mod user;
pub mod wellness;

pub use session::{AuthEvent, AuthStateChange, Session, SessionUser};
pub use stats::MoodSummary;
pub use user::{Credentials, Profile, ProfileUpdate};
pub use wellness::{
    ActivityKind, ActivityLog, Intensity, MoodEntry, NewActivity, NewMoodEntry, PendingRecord,
    Recorded,
};
