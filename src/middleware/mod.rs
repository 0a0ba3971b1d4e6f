// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outgoing request middleware (pipeline layers, bearer credentials).

pub mod auth;
pub mod pipeline;

pub use auth::{attach_bearer, token_claims};
pub use pipeline::{RequestLayer, RequestPipeline};
