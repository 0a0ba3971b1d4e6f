// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - client logic layer.

pub mod api;
pub mod classifier;
pub mod session;
pub mod supabase;
pub mod transport;
pub mod wellness;

pub use api::ApiClient;
pub use classifier::{classify, ApiFailure, Classified, FailureKind};
pub use session::SessionManager;
pub use supabase::{IdentityProvider, SignUpOutcome, SupabaseAuth};
pub use transport::{ApiRequest, RawResponse, ReqwestTransport, Transport, TransportError};
pub use wellness::{SyncReport, WellnessService};
